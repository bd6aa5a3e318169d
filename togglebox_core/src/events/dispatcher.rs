use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::time::{interval_at, Duration, Instant};

use super::{
    BoundedEventQueue, ConversionEvent, CustomEvent, EventMetaData, EventSink,
    ExperimentExposureEvent, FlagEvaluationEvent, TrackingEvent,
};
use crate::SdkMetadata;

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    pub ingestion_url: String,
    pub api_key: String,
    pub delivery_interval_ms: u64,
    pub sdk_metadata: SdkMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryPayload<'a> {
    meta_data: EventMetaData,
    events: &'a [TrackingEvent],
}

/// Drains a [`BoundedEventQueue`] to the ingestion endpoint in the background.
///
/// Delivery is best-effort, at-least-once at most: errors are logged and the batch is dropped;
/// the evaluation path that produced the events is never blocked or failed. Requires a tokio
/// runtime (the delivery loop is spawned onto it).
pub struct EventDispatcher {
    config: EventDispatcherConfig,
    queue: BoundedEventQueue,
    delivery_task_active: Arc<Mutex<bool>>,
}

impl EventDispatcher {
    pub fn new(config: EventDispatcherConfig, queue: BoundedEventQueue) -> Self {
        EventDispatcher {
            config,
            queue,
            delivery_task_active: Arc::new(Mutex::new(false)),
        }
    }

    /// Enqueues an event and starts the delivery loop if needed.
    pub fn dispatch(&self, event: TrackingEvent) {
        self.queue.push(event);

        // Start the delivery loop if it's not already active
        if !self.is_delivery_timer_active() {
            self.start_delivery_loop();
        }
    }

    fn start_delivery_loop(&self) {
        let active_flag = Arc::clone(&self.delivery_task_active);
        let config = self.config.clone();
        let queue = self.queue.clone();

        // Mark the delivery loop as active
        {
            let mut is_active = active_flag.lock().unwrap();
            *is_active = true;
        }

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            let interval_duration = Duration::from_millis(config.delivery_interval_ms);
            let mut interval = interval_at(Instant::now() + interval_duration, interval_duration);
            loop {
                interval.tick().await;
                let events_to_process = queue.next_batch();
                if !events_to_process.is_empty() {
                    deliver(&client, &config, &events_to_process).await;
                } else {
                    // If no more events to deliver, break the loop
                    let mut is_active = active_flag.lock().unwrap();
                    *is_active = false;
                    break;
                }
            }
        });
    }

    fn is_delivery_timer_active(&self) -> bool {
        *self.delivery_task_active.lock().unwrap()
    }
}

impl EventSink for EventDispatcher {
    fn track_flag_evaluation(&self, event: FlagEvaluationEvent) {
        self.dispatch(TrackingEvent::FlagEvaluation(event));
    }

    fn track_experiment_exposure(&self, event: ExperimentExposureEvent) {
        self.dispatch(TrackingEvent::ExperimentExposure(event));
    }

    fn track_conversion(&self, event: ConversionEvent) {
        self.dispatch(TrackingEvent::Conversion(event));
    }

    fn track_event(&self, event: CustomEvent) {
        self.dispatch(TrackingEvent::Custom(event));
    }
}

async fn deliver(client: &reqwest::Client, config: &EventDispatcherConfig, events: &[TrackingEvent]) {
    let payload = DeliveryPayload {
        meta_data: (&config.sdk_metadata).into(),
        events,
    };

    let result = client
        .post(&config.ingestion_url)
        .query(&[("apiKey", &config.api_key)])
        .json(&payload)
        .send()
        .await
        .and_then(|response| response.error_for_status());

    match result {
        Ok(_) => {
            log::debug!(target: "togglebox",
                        count = events.len();
                        "delivered event batch");
        }
        Err(err) => {
            // Best-effort: the batch is lost, the caller is never failed.
            log::warn!(target: "togglebox",
                       count = events.len();
                       "failed to deliver event batch: {err}");
        }
    }
}
