use serde::Serialize;

use crate::bucketer::{Bucketer, Md5Bucketer};
use crate::flags::Value;
use crate::{EvaluationContext, Str};

use super::Experiment;

/// Result of assigning a context to an experiment variation.
///
/// Derived, never stored: assignments are recomputed on every call from the experiment
/// definition and context. Stickiness comes from deterministic hashing, not storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAssignment {
    pub experiment_key: Str,
    pub variation_key: Str,
    /// The variation's value.
    pub value: Value,
    /// `true` when the assigned variation is the experiment's control.
    pub is_control: bool,
    /// Explanation of the match: force-include or normal bucketing, and the percentage boundary
    /// crossed.
    pub reason: String,
}

/// Why a context was not assigned to any variation. Internal to logging; callers only see
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonAssignmentReason {
    StatusNotServing,
    ForceExcluded,
    LocaleMismatch,
    TrafficAllocationGap,
    UnknownVariation,
}

/// Assign the context to one of the experiment's variations, or `None` when the user is not in
/// the experiment.
///
/// Pure function of `(experiment, context)`. Re-running with the same inputs always returns the
/// same variation. Re-balancing traffic percentages reshuffles users near the moved boundaries
/// on their next evaluation; that is an accepted trade-off of hash bucketing without a persisted
/// assignment table.
///
/// Eligibility gate, all must pass:
/// - status is `running` or `paused` (paused keeps serving already-bucketed users so in-flight
///   analysis stays consistent);
/// - the user is not force-excluded;
/// - country/language targeting matches, unless the user is force-included.
///
/// Once eligible, the bucketing score is walked against cumulative traffic-allocation
/// percentages in definition order; a score past the covered range means the user is excluded
/// by a traffic allocation gap.
pub fn assign_variation(
    experiment: &Experiment,
    context: &EvaluationContext,
) -> Option<VariantAssignment> {
    assign_variation_with_bucketer(&Md5Bucketer, experiment, context)
}

/// Same as [`assign_variation`] but with a caller-provided [`Bucketer`].
pub fn assign_variation_with_bucketer(
    bucketer: &impl Bucketer,
    experiment: &Experiment,
    context: &EvaluationContext,
) -> Option<VariantAssignment> {
    match resolve(bucketer, experiment, context) {
        Ok(assignment) => {
            log::trace!(target: "togglebox",
                        experiment_key = experiment.experiment_key,
                        user_id = context.user_id(),
                        variation_key = assignment.variation_key,
                        reason = assignment.reason;
                        "assigned a variation");
            Some(assignment)
        }
        Err(reason) => {
            log::trace!(target: "togglebox",
                        experiment_key = experiment.experiment_key,
                        user_id = context.user_id();
                        "user not in experiment: {reason:?}");
            None
        }
    }
}

fn resolve(
    bucketer: &impl Bucketer,
    experiment: &Experiment,
    context: &EvaluationContext,
) -> Result<VariantAssignment, NonAssignmentReason> {
    if !experiment.status.serves_assignments() {
        return Err(NonAssignmentReason::StatusNotServing);
    }

    let user_id = context.user_id();
    let targeting = &experiment.targeting;

    if targeting.is_force_excluded(user_id) {
        return Err(NonAssignmentReason::ForceExcluded);
    }

    let force_included = targeting.is_force_included(user_id);
    if !force_included && !targeting.matches_locale(context) {
        return Err(NonAssignmentReason::LocaleMismatch);
    }

    let score = bucketer.bucket(&experiment.experiment_key, user_id);

    // Walk the allocation in definition order; boundaries are cumulative and order-sensitive.
    let mut lower = 0.0;
    for split in &experiment.traffic_allocation {
        let upper = lower + split.percentage;
        if score < upper {
            // A split naming an unknown variation is a write-time data-integrity bug; treat the
            // user as not eligible rather than crash.
            let variation = experiment
                .variation(&split.variation_key)
                .ok_or(NonAssignmentReason::UnknownVariation)?;

            let matched_by = if force_included {
                "force-included"
            } else {
                "bucketed"
            };
            return Ok(VariantAssignment {
                experiment_key: experiment.experiment_key.clone(),
                variation_key: variation.key.clone(),
                value: variation.value.clone(),
                is_control: variation.key == experiment.control_variation,
                reason: format!(
                    "{matched_by}: score {score:.2} within [{lower:.2}, {upper:.2}) for variation {}",
                    variation.key
                ),
            });
        }
        lower = upper;
    }

    // Percentages summed to less than 100 and the score fell in the uncovered tail.
    Err(NonAssignmentReason::TrafficAllocationGap)
}
