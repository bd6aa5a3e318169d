use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    ConversionEvent, CustomEvent, EventSink, ExperimentExposureEvent, FlagEvaluationEvent,
    TrackingEvent,
};

const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 10_000;

/// Default hard cap on queued events.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 50_000;

/// A bounded queue decoupling event recording from the evaluation call path.
///
/// `push` never blocks and never fails: when the queue is at capacity, the oldest queued event is
/// dropped to make room. The queue owner (usually an [`EventDispatcher`][super::EventDispatcher])
/// drains it in batches in the background.
#[derive(Debug, Clone)]
pub struct BoundedEventQueue {
    batch_size: usize,
    max_queue_size: usize,
    event_queue: Arc<Mutex<VecDeque<TrackingEvent>>>,
    dropped: Arc<AtomicU64>,
}

impl BoundedEventQueue {
    pub fn new(batch_size: usize) -> Self {
        BoundedEventQueue::with_max_queue_size(batch_size, DEFAULT_MAX_QUEUE_SIZE)
    }

    pub fn with_max_queue_size(batch_size: usize, max_queue_size: usize) -> Self {
        // clamp batch size between min and max
        let batch_size = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        BoundedEventQueue {
            batch_size,
            max_queue_size: max_queue_size.max(batch_size),
            event_queue: Arc::new(Mutex::new(VecDeque::new())),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn push(&self, event: TrackingEvent) {
        let mut queue = self.event_queue.lock().unwrap();
        if queue.len() >= self.max_queue_size {
            // Oldest-drop policy: the freshest events are the ones the aggregator is still
            // waiting for.
            queue.pop_front();
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % 1000 == 1 {
                log::warn!(target: "togglebox",
                           dropped;
                           "event queue overflow, dropping oldest events");
            }
        }
        queue.push_back(event);
    }

    pub fn next_batch(&self) -> Vec<TrackingEvent> {
        let mut queue = self.event_queue.lock().unwrap();
        let mut batch = vec![];
        while let Some(event) = queue.pop_front() {
            batch.push(event);
            if batch.len() >= self.batch_size {
                break;
            }
        }
        batch
    }

    pub fn is_empty(&self) -> bool {
        let queue = self.event_queue.lock().unwrap();
        queue.is_empty()
    }

    pub fn queued_event_count(&self) -> usize {
        let queue = self.event_queue.lock().unwrap();
        queue.len()
    }

    /// Number of events dropped to the oldest-drop policy since creation.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for BoundedEventQueue {
    fn track_flag_evaluation(&self, event: FlagEvaluationEvent) {
        self.push(TrackingEvent::FlagEvaluation(event));
    }

    fn track_experiment_exposure(&self, event: ExperimentExposureEvent) {
        self.push(TrackingEvent::ExperimentExposure(event));
    }

    fn track_conversion(&self, event: ConversionEvent) {
        self.push(TrackingEvent::Conversion(event));
    }

    fn track_event(&self, event: CustomEvent) {
        self.push(TrackingEvent::Custom(event));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn custom(n: u64) -> TrackingEvent {
        TrackingEvent::Custom(CustomEvent {
            event_name: format!("event-{n}").into(),
            user_id: "u1".into(),
            data: None,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = BoundedEventQueue::with_max_queue_size(100, 100);
        for n in 0..150 {
            queue.push(custom(n));
        }

        assert_eq!(queue.queued_event_count(), 100);
        assert_eq!(queue.dropped_event_count(), 50);

        // The head of the queue is now event 50; 0..50 were dropped.
        let batch = queue.next_batch();
        match &batch[0] {
            TrackingEvent::Custom(event) => assert_eq!(event.event_name, "event-50"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn next_batch_respects_batch_size() {
        let queue = BoundedEventQueue::new(100);
        for n in 0..250 {
            queue.push(custom(n));
        }

        assert_eq!(queue.next_batch().len(), 100);
        assert_eq!(queue.next_batch().len(), 100);
        assert_eq!(queue.next_batch().len(), 50);
        assert!(queue.is_empty());
    }
}
