use serde::Serialize;

use crate::bucketer::{Bucketer, Md5Bucketer};
use crate::{EvaluationContext, Str};

use super::{Flag, FlagValue, ServedValue};

/// Result of resolving a flag for a context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEvaluation {
    pub flag_key: Str,
    /// Which of the two values was served.
    pub served_value: ServedValue,
    /// The actual value behind [`FlagEvaluation::served_value`].
    pub value: FlagValue,
    /// Human-readable explanation of which resolution step matched.
    pub reason: String,
}

/// Resolve which of the flag's two values the given context receives.
///
/// This is a pure function of `(flag, context)`: identical inputs always produce identical
/// outputs, which is what makes the served value sticky without a persisted per-user table.
///
/// Resolution precedence, first match wins:
/// 1. disabled flag serves the default value;
/// 2. force-excluded users serve the default value;
/// 3. force-included users skip no steps but get a reason prefix (force-include guarantees
///    targeting eligibility, it does not pick A or B);
/// 4. country rule, refined by language when the rule carries language overrides;
/// 5. rollout window over the bucketing score (a gap between the A and B windows falls through
///    to the default);
/// 6. default value.
pub fn evaluate_flag(flag: &Flag, context: &EvaluationContext) -> FlagEvaluation {
    evaluate_flag_with_bucketer(&Md5Bucketer, flag, context)
}

/// Same as [`evaluate_flag`] but with a caller-provided [`Bucketer`].
pub fn evaluate_flag_with_bucketer(
    bucketer: &impl Bucketer,
    flag: &Flag,
    context: &EvaluationContext,
) -> FlagEvaluation {
    let evaluation = resolve(bucketer, flag, context);
    log::trace!(target: "togglebox",
                flag_key = flag.flag_key,
                user_id = context.user_id(),
                served_value:serde = evaluation.served_value,
                reason = evaluation.reason;
                "evaluated a flag");
    evaluation
}

fn resolve(bucketer: &impl Bucketer, flag: &Flag, context: &EvaluationContext) -> FlagEvaluation {
    let user_id = context.user_id();

    if !flag.enabled {
        return serve(flag, flag.default_value, "flag disabled".to_owned());
    }

    if flag.targeting.is_force_excluded(user_id) {
        return serve(flag, flag.default_value, "user force-excluded".to_owned());
    }

    // Force-include guarantees targeting eligibility but does not itself pick A/B; value
    // selection continues below with a reason prefix.
    let prefix = if flag.targeting.is_force_included(user_id) {
        "force-included, "
    } else {
        ""
    };

    if let Some((rule, served_value)) = flag.targeting.matching_rule(context) {
        return serve(
            flag,
            served_value,
            format!(
                "{prefix}matched country/language targeting rule for {}",
                rule.country
            ),
        );
    }

    if flag.rollout_enabled {
        let score = bucketer.bucket(&flag.flag_key, user_id);
        if score < flag.rollout_percentage_a {
            return serve(flag, ServedValue::A, format!("{prefix}rollout applied"));
        }
        if score < flag.rollout_percentage_a + flag.rollout_percentage_b {
            return serve(flag, ServedValue::B, format!("{prefix}rollout applied"));
        }
        return serve(
            flag,
            flag.default_value,
            format!("{prefix}rollout gap, default served"),
        );
    }

    serve(flag, flag.default_value, format!("{prefix}default value"))
}

fn serve(flag: &Flag, served_value: ServedValue, reason: String) -> FlagEvaluation {
    FlagEvaluation {
        flag_key: flag.flag_key.clone(),
        served_value,
        value: flag.value(served_value),
        reason,
    }
}
