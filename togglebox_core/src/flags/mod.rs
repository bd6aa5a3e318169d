//! Tier 2: two-valued (A/B) feature flags with targeting and percentage rollout.
mod eval;
mod models;

pub use eval::{evaluate_flag, evaluate_flag_with_bucketer, FlagEvaluation};
pub use models::*;
