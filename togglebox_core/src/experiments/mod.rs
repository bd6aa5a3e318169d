//! Tier 3: multi-variant experiments with weighted traffic allocation.
mod eval;
mod models;

pub use eval::{assign_variation, assign_variation_with_bucketer, VariantAssignment};
pub use models::*;
