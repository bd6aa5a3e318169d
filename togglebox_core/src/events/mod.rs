//! Exposure/conversion recording.
//!
//! Evaluation paths report what they served through the [`EventSink`] contract; a stats pipeline
//! consumes the events to aggregate per-variation results. Recording is fire-and-forget: sink
//! implementations must never block, retry, or fail the calling evaluation path. The statistics
//! math itself lives outside this crate; only the event shapes it consumes are defined here.
mod dispatcher;
mod queue;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use dispatcher::{EventDispatcher, EventDispatcherConfig};
pub use queue::{BoundedEventQueue, DEFAULT_MAX_QUEUE_SIZE};

use crate::flags::ServedValue;
use crate::{SdkMetadata, Str};

/// A Tier 2 flag evaluation, recorded on every call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvaluationEvent {
    pub flag_key: Str,
    /// Which of the two values was served, `"A"` or `"B"`.
    pub served_value: ServedValue,
    pub user_id: Str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Str>,
    pub timestamp: DateTime<Utc>,
}

/// A user being assigned to and shown an experiment variation.
///
/// Reported once per non-null assignment call; deduplication of repeated exposures, if desired,
/// is the recording layer's responsibility.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentExposureEvent {
    pub experiment_key: Str,
    pub variation_key: Str,
    pub user_id: Str,
    pub timestamp: DateTime<Utc>,
}

/// A conversion attributed to the user's (recomputed) variation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEvent {
    pub experiment_key: Str,
    pub metric_id: Str,
    pub variation_key: Str,
    pub user_id: Str,
    /// Present only for sum/average metric types; absent for conversion/count types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// An application-defined event, matched to metrics by name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub event_name: Str,
    pub user_id: Str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// Any event flowing through the recording pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "eventType", rename_all = "camelCase")]
pub enum TrackingEvent {
    FlagEvaluation(FlagEvaluationEvent),
    ExperimentExposure(ExperimentExposureEvent),
    Conversion(ConversionEvent),
    Custom(CustomEvent),
}

/// Additional metadata such as SDK language and version, attached once per delivered batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetaData {
    pub sdk_name: &'static str,
    pub sdk_version: &'static str,
    pub core_version: &'static str,
}

impl From<&SdkMetadata> for EventMetaData {
    fn from(sdk: &SdkMetadata) -> EventMetaData {
        EventMetaData {
            sdk_name: sdk.name,
            sdk_version: sdk.version,
            core_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// The contract between evaluation and the stats pipeline.
///
/// Implementations must be non-blocking relative to the evaluation/assignment call path and must
/// swallow their own errors; at-least-once delivery downstream is acceptable. Under sustained
/// overload, queue-backed implementations drop the oldest events rather than grow without bound.
pub trait EventSink {
    /// Record which value a flag served.
    fn track_flag_evaluation(&self, event: FlagEvaluationEvent);
    /// Record an experiment exposure.
    fn track_experiment_exposure(&self, event: ExperimentExposureEvent);
    /// Record a conversion.
    fn track_conversion(&self, event: ConversionEvent);
    /// Record an application-defined event.
    fn track_event(&self, event: CustomEvent);
}

/// Sink that discards every event.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn track_flag_evaluation(&self, _event: FlagEvaluationEvent) {}
    fn track_experiment_exposure(&self, _event: ExperimentExposureEvent) {}
    fn track_conversion(&self, _event: ConversionEvent) {}
    fn track_event(&self, _event: CustomEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_event_omits_absent_value() {
        let event = ConversionEvent {
            experiment_key: "exp".into(),
            metric_id: "m1".into(),
            variation_key: "control".into(),
            user_id: "u1".into(),
            value: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("value").is_none());
        assert_eq!(json["variationKey"], "control");
    }

    #[test]
    fn tracking_event_is_tagged_by_type() {
        let event = TrackingEvent::FlagEvaluation(FlagEvaluationEvent {
            flag_key: "f".into(),
            served_value: ServedValue::B,
            user_id: "u".into(),
            country: None,
            language: None,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "flagEvaluation");
        assert_eq!(json["servedValue"], "B");
    }
}
