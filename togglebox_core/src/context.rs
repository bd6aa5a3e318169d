use serde::{Deserialize, Serialize};

use crate::Str;

/// User id served when the caller did not provide one.
pub const ANONYMOUS_USER: &str = "anonymous";

/// User context an evaluation runs against.
///
/// A context is immutable per evaluation call. Clients typically hold a default context
/// (resolved once at construction) and merge a per-call override into it at the call boundary
/// with [`EvaluationContext::merge`]; there is no shared mutable global context.
///
/// # Examples
/// ```
/// # use togglebox_core::EvaluationContext;
/// let context = EvaluationContext::new("user-42").with_country("CA").with_language("fr");
/// assert_eq!(context.user_id(), "user-42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    /// Unique id of the user being evaluated. Evaluates as [`ANONYMOUS_USER`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Str>,
    /// ISO-3166 two-letter country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Str>,
    /// ISO-639 two/three-letter language code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Str>,
}

impl EvaluationContext {
    /// Create a context for the given user id.
    pub fn new(user_id: impl Into<Str>) -> EvaluationContext {
        EvaluationContext {
            user_id: Some(user_id.into()),
            country: None,
            language: None,
        }
    }

    /// Create a context with no user id. Evaluations treat it as [`ANONYMOUS_USER`].
    pub fn anonymous() -> EvaluationContext {
        EvaluationContext::default()
    }

    /// Set the country code.
    pub fn with_country(mut self, country: impl Into<Str>) -> EvaluationContext {
        self.country = Some(country.into());
        self
    }

    /// Set the language code.
    pub fn with_language(mut self, language: impl Into<Str>) -> EvaluationContext {
        self.language = Some(language.into());
        self
    }

    /// The user id to evaluate with, falling back to [`ANONYMOUS_USER`].
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    /// Merge `overrides` into this context. Every field set on `overrides` wins; unset fields
    /// fall back to `self`. Neither input is mutated.
    pub fn merge(&self, overrides: &EvaluationContext) -> EvaluationContext {
        EvaluationContext {
            user_id: overrides.user_id.clone().or_else(|| self.user_id.clone()),
            country: overrides.country.clone().or_else(|| self.country.clone()),
            language: overrides.language.clone().or_else(|| self.language.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_call_fields_win() {
        let base = EvaluationContext::new("default-user").with_country("US").with_language("en");
        let call = EvaluationContext::new("user-1").with_country("FR");

        let merged = base.merge(&call);

        assert_eq!(merged.user_id(), "user-1");
        assert_eq!(merged.country.as_deref(), Some("FR"));
        // Unset on the override, inherited from the base.
        assert_eq!(merged.language.as_deref(), Some("en"));
    }

    #[test]
    fn missing_user_id_evaluates_as_anonymous() {
        let context = EvaluationContext::anonymous().with_country("DE");
        assert_eq!(context.user_id(), ANONYMOUS_USER);
    }

    #[test]
    fn merge_of_empty_override_is_identity() {
        let base = EvaluationContext::new("u").with_country("CA").with_language("fr");
        assert_eq!(base.merge(&EvaluationContext::anonymous()), base);
    }
}
