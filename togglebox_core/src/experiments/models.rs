use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::flags::{TryParse, Value};
use crate::Str;

/// Response format of the experiments endpoint: every experiment for a `(platform, environment)`
/// pair, keyed by experiment key.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentsResponse {
    pub experiments: HashMap<Str, TryParse<Experiment>>,
}

/// A multi-variant experiment with weighted traffic allocation and control-group bookkeeping.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub experiment_key: Str,
    pub status: ExperimentStatus,
    pub variations: Vec<Variation>,
    /// Key of the variation designated as control.
    pub control_variation: Str,
    /// Weighted traffic allocation, one entry per variation, in the order variations were
    /// defined. Percentage boundaries are cumulative and order-sensitive, so the order is never
    /// re-sorted. Percentages should sum to 100; the API boundary enforces that, the assignor
    /// tolerates any sum.
    pub traffic_allocation: Vec<TrafficSplit>,
    #[serde(default)]
    pub targeting: ExperimentTargeting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_metric: Option<Metric>,
    #[serde(default)]
    pub secondary_metrics: Vec<Metric>,
    /// Confidence level used by the results aggregator, in (0, 1).
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Winning variation key, set when the experiment is completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Str>,
}

fn default_confidence_level() -> f64 {
    0.95
}

impl Experiment {
    /// Look up a variation by key.
    pub fn variation(&self, key: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| &*v.key == key)
    }
}

/// Lifecycle status of an experiment.
///
/// Transitions form a one-directional state machine, except `running ⇄ paused`:
/// `draft → running → {paused ⇄ running} → completed → archived`.
///
/// Draft experiments may be freely edited; once running, only traffic allocation may be adjusted
/// in place. Only draft experiments may be deleted by ordinary flows.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Archived,
}

impl ExperimentStatus {
    /// Return `true` if the transition to `next` is allowed.
    pub fn can_transition_to(self, next: ExperimentStatus) -> bool {
        use ExperimentStatus::*;
        matches!(
            (self, next),
            (Draft, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Paused, Completed)
                | (Completed, Archived)
        )
    }

    /// Return `true` if the assignor serves variations in this status.
    ///
    /// Paused experiments keep serving already-bucketed users identically so in-flight analysis
    /// stays consistent; the surrounding system stops admitting new stats-affecting exposures.
    pub fn serves_assignments(self) -> bool {
        matches!(self, ExperimentStatus::Running | ExperimentStatus::Paused)
    }

    /// Return `true` if ordinary flows may delete an experiment in this status.
    pub fn is_deletable(self) -> bool {
        self == ExperimentStatus::Draft
    }

    /// Return `true` if variations and targeting may still be edited.
    pub fn is_editable(self) -> bool {
        self == ExperimentStatus::Draft
    }
}

/// One arm of an experiment.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub key: Str,
    pub name: Str,
    pub value: Value,
    /// Exactly one variation per experiment carries `isControl: true`.
    #[serde(default)]
    pub is_control: bool,
}

/// Share of eligible traffic routed to one variation.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSplit {
    pub variation_key: Str,
    pub percentage: f64,
}

/// Targeting for experiments: country/language presence alone determines eligibility; value
/// selection is the traffic allocation's job.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentTargeting {
    #[serde(default)]
    pub countries: Vec<EligibleCountry>,
    #[serde(default)]
    pub force_include_users: Vec<Str>,
    #[serde(default)]
    pub force_exclude_users: Vec<Str>,
}

impl ExperimentTargeting {
    pub(crate) fn is_force_excluded(&self, user_id: &str) -> bool {
        self.force_exclude_users.iter().any(|u| &**u == user_id)
    }

    pub(crate) fn is_force_included(&self, user_id: &str) -> bool {
        self.force_include_users.iter().any(|u| &**u == user_id)
    }

    /// Country/language eligibility. An empty country list admits everyone.
    pub(crate) fn matches_locale(&self, context: &crate::EvaluationContext) -> bool {
        if self.countries.is_empty() {
            return true;
        }
        let Some(country) = context.country.as_deref() else {
            return false;
        };
        let Some(rule) = self
            .countries
            .iter()
            .find(|rule| rule.country.eq_ignore_ascii_case(country))
        else {
            return false;
        };
        rule.languages.is_empty()
            || context
                .language
                .as_deref()
                .is_some_and(|language| {
                    rule.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
                })
    }
}

/// An eligible country, optionally narrowed to specific languages.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EligibleCountry {
    pub country: Str,
    #[serde(default)]
    pub languages: Vec<Str>,
}

/// A metric the results aggregator computes per variation.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub id: Str,
    pub name: Str,
    /// Name of the tracked event this metric aggregates.
    pub event_name: Str,
    pub metric_type: MetricType,
    pub success_direction: SuccessDirection,
}

/// How conversion events roll up into a metric.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum MetricType {
    Conversion,
    Count,
    Sum,
    Average,
}

impl MetricType {
    /// Return `true` if conversion events for this metric carry a numeric value.
    pub fn takes_value(self) -> bool {
        matches!(self, MetricType::Sum | MetricType::Average)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum SuccessDirection {
    Increase,
    Decrease,
}

#[cfg(test)]
mod tests {
    use super::ExperimentStatus::*;

    #[test]
    fn status_transitions_are_one_directional() {
        assert!(Draft.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Paused.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Archived));

        assert!(!Running.can_transition_to(Draft));
        assert!(!Paused.can_transition_to(Draft));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Archived.can_transition_to(Completed));
        assert!(!Draft.can_transition_to(Paused));
        assert!(!Draft.can_transition_to(Archived));
    }

    #[test]
    fn only_drafts_are_deletable_and_editable() {
        for status in [Running, Paused, Completed, Archived] {
            assert!(!status.is_deletable());
            assert!(!status.is_editable());
        }
        assert!(Draft.is_deletable());
        assert!(Draft.is_editable());
    }

    #[test]
    fn paused_experiments_keep_serving() {
        assert!(Running.serves_assignments());
        assert!(Paused.serves_assignments());
        for status in [Draft, Completed, Archived] {
            assert!(!status.serves_assignments());
        }
    }
}
