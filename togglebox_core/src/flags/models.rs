use std::collections::HashMap;
use std::sync::Arc;

use derive_more::From;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

use crate::Str;

/// Response format of the flags endpoint: every flag active for a `(platform, environment)`
/// pair, keyed by flag key.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlagsResponse {
    /// Flag definitions.
    ///
    /// Values are wrapped in `TryParse` so that if we fail to parse one flag (e.g., new server
    /// format), we can still serve other flags.
    pub flags: HashMap<Str, TryParse<Flag>>,
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
///
/// This can be helpful to isolate errors in a subtree. e.g., if configuration for one flag parses,
/// the rest of the flags are still usable.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}

impl<T> TryParse<T> {
    pub fn as_parsed(&self) -> Option<&T> {
        match self {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A two-valued (A/B) feature flag with targeting and percentage rollout.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub flag_key: Str,
    /// Global kill switch. A disabled flag always serves its default value.
    pub enabled: bool,
    pub flag_type: FlagType,
    pub value_a: Value,
    pub value_b: Value,
    /// Which of the two values is served when nothing else matches.
    pub default_value: ServedValue,
    #[serde(default)]
    pub targeting: Targeting,
    #[serde(default)]
    pub rollout_enabled: bool,
    /// Percentage of the bucket space serving value A when rollout is enabled. The A and B
    /// percentages need not sum to 100: overlap and gaps are a modeling choice, not an error.
    #[serde(default)]
    pub rollout_percentage_a: f64,
    #[serde(default)]
    pub rollout_percentage_b: f64,
    /// Active version of the flag. Versions are immutable once created; only the active one is
    /// ever served.
    #[serde(default)]
    pub version: Str,
}

impl Flag {
    /// The wire value behind the given letter.
    pub fn wire_value(&self, served: ServedValue) -> &Value {
        match served {
            ServedValue::A => &self.value_a,
            ServedValue::B => &self.value_b,
        }
    }

    /// The typed value behind the given letter.
    ///
    /// A definition whose value does not match its declared `flag_type` is a write-time
    /// data-integrity bug; evaluation falls back to the wire value's natural type instead of
    /// failing.
    pub fn value(&self, served: ServedValue) -> FlagValue {
        let wire = self.wire_value(served);
        wire.to_flag_value(self.flag_type).unwrap_or_else(|| {
            log::warn!(target: "togglebox",
                       flag_key = self.flag_key,
                       flag_type:serde = self.flag_type;
                       "flag value does not match declared type");
            wire.natural_flag_value()
        })
    }
}

/// Type of the values a flag serves.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum FlagType {
    Boolean,
    String,
    Number,
    Json,
}

/// Which of the two flag values is served. Serialized as `"A"` / `"B"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ServedValue {
    A,
    B,
}

/// Subset of [`serde_json::Value`].
///
/// Unlike [`FlagValue`], `Value` is untagged, so we don't know the exact type until we combine it
/// with the [`FlagType`] declared at the flag level.
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum Value {
    /// Boolean maps to [`FlagValue::Boolean`].
    Boolean(bool),
    /// Number maps to [`FlagValue::Number`].
    Number(f64),
    /// String maps to either [`FlagValue::String`] or [`FlagValue::Json`].
    String(Str),
}

impl Value {
    /// Try to convert `Value` to [`FlagValue`] under the given [`FlagType`].
    pub fn to_flag_value(&self, ty: FlagType) -> Option<FlagValue> {
        Some(match ty {
            FlagType::Boolean => FlagValue::Boolean(self.as_boolean()?),
            FlagType::Number => FlagValue::Number(self.as_number()?),
            FlagType::String => FlagValue::String(self.as_str()?.into()),
            FlagType::Json => {
                let raw: Str = self.as_str()?.into();
                let parsed = serde_json::from_str(&raw).ok()?;
                FlagValue::Json {
                    raw,
                    parsed: Arc::new(parsed),
                }
            }
        })
    }

    /// Convert to [`FlagValue`] by the value's own shape, ignoring any declared type.
    pub(crate) fn natural_flag_value(&self) -> FlagValue {
        match self {
            Value::Boolean(b) => FlagValue::Boolean(*b),
            Value::Number(n) => FlagValue::Number(*n),
            Value::String(s) => FlagValue::String(s.clone()),
        }
    }

    fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

/// A flag value combined with its declared type.
///
/// # Serialization
///
/// When serialized to JSON, serialized as a two-field object with `type` and `value`. Type is one
/// of "boolean", "number", "string", or "json". Value is either boolean, number, string, or
/// arbitrary JSON value.
///
/// Example:
/// ```json
/// {"type":"json","value":{"hello":"world"}}
/// ```
#[derive(Debug, Clone)]
pub enum FlagValue {
    /// A boolean value.
    Boolean(bool),
    /// A numeric value (floating-point).
    Number(f64),
    /// A string value.
    String(Str),
    /// Arbitrary JSON value.
    Json {
        raw: Str,
        parsed: Arc<serde_json::Value>,
    },
}

impl Serialize for FlagValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("FlagValue", 2)?;
        match self {
            FlagValue::Boolean(b) => {
                state.serialize_field("type", "boolean")?;
                state.serialize_field("value", b)?;
            }
            FlagValue::Number(n) => {
                state.serialize_field("type", "number")?;
                state.serialize_field("value", n)?;
            }
            FlagValue::String(s) => {
                state.serialize_field("type", "string")?;
                state.serialize_field("value", s)?;
            }
            FlagValue::Json { raw: _, parsed } => {
                state.serialize_field("type", "json")?;
                state.serialize_field("value", parsed)?;
            }
        }
        state.end()
    }
}

impl PartialEq for FlagValue {
    // Compare ignoring Json::raw.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FlagValue::Boolean(v1), FlagValue::Boolean(v2)) => v1 == v2,
            (FlagValue::Number(v1), FlagValue::Number(v2)) => v1 == v2,
            (FlagValue::String(v1), FlagValue::String(v2)) => v1 == v2,
            (FlagValue::Json { parsed: v1, .. }, FlagValue::Json { parsed: v2, .. }) => v1 == v2,
            _ => false,
        }
    }
}

impl FlagValue {
    /// Returns the value as a boolean if it is of type Boolean.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a number if it is of type Number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FlagValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a string if it is of type String.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a JSON value if it is of type Json.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            FlagValue::Json { raw: _, parsed } => Some(parsed),
            _ => None,
        }
    }

    /// Returns the type of the value.
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValue::Boolean(_) => FlagType::Boolean,
            FlagValue::Number(_) => FlagType::Number,
            FlagValue::String(_) => FlagType::String,
            FlagValue::Json { .. } => FlagType::Json,
        }
    }
}

/// Targeting rules of a flag: forced user lists and country/language rules.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Targeting {
    #[serde(default)]
    pub countries: Vec<CountryRule>,
    /// Users guaranteed to pass targeting eligibility. Force-include does not itself pick a
    /// value; resolution continues at country/rollout selection.
    #[serde(default)]
    pub force_include_users: Vec<Str>,
    /// Users that always receive the flag's default value.
    #[serde(default)]
    pub force_exclude_users: Vec<Str>,
}

impl Targeting {
    pub(crate) fn is_force_excluded(&self, user_id: &str) -> bool {
        self.force_exclude_users.iter().any(|u| &**u == user_id)
    }

    pub(crate) fn is_force_included(&self, user_id: &str) -> bool {
        self.force_include_users.iter().any(|u| &**u == user_id)
    }

    /// Find the serve value of the first country rule matching the context, drilling into
    /// language-level overrides when present. Country and language codes are matched
    /// case-insensitively since SDKs disagree on casing.
    pub(crate) fn matching_rule(
        &self,
        context: &crate::EvaluationContext,
    ) -> Option<(&CountryRule, ServedValue)> {
        let country = context.country.as_deref()?;
        let rule = self
            .countries
            .iter()
            .find(|rule| rule.country.eq_ignore_ascii_case(country))?;

        if let Some(language) = context.language.as_deref() {
            if let Some(language_rule) = rule
                .languages
                .iter()
                .find(|l| l.language.eq_ignore_ascii_case(language))
            {
                return Some((rule, language_rule.serve_value));
            }
        }
        Some((rule, rule.serve_value))
    }
}

/// Serve a specific value to a country, optionally refined per language.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CountryRule {
    pub country: Str,
    pub serve_value: ServedValue,
    #[serde(default)]
    pub languages: Vec<LanguageRule>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct LanguageRule {
    pub language: Str,
    pub serve_value: ServedValue,
}

#[cfg(test)]
mod tests {
    use super::{FlagType, FlagValue, FlagsResponse, TryParse, Value};

    #[test]
    fn parse_partially_if_unexpected() {
        let response: FlagsResponse = serde_json::from_str(
            r#"
              {
                "flags": {
                  "success": {
                    "flagKey": "success",
                    "enabled": true,
                    "flagType": "boolean",
                    "valueA": true,
                    "valueB": false,
                    "defaultValue": "A",
                    "version": "v1"
                  },
                  "fail_parsing": {
                    "flagKey": "fail_parsing",
                    "enabled": true,
                    "flagType": "new_type",
                    "valueA": 1,
                    "valueB": 2,
                    "defaultValue": "A",
                    "version": "v1"
                  }
                }
              }
            "#,
        )
        .unwrap();
        assert!(
            matches!(response.flags.get("success").unwrap(), TryParse::Parsed(_)),
            "{:?} should match TryParse::Parsed(_)",
            response.flags.get("success").unwrap()
        );
        assert!(
            matches!(
                response.flags.get("fail_parsing").unwrap(),
                TryParse::ParseFailed(_)
            ),
            "{:?} should match TryParse::ParseFailed(_)",
            response.flags.get("fail_parsing").unwrap()
        );
    }

    #[test]
    fn wire_value_combines_with_declared_type() {
        let value: Value = r#"{"max": 3}"#.into();
        let flag_value = value.to_flag_value(FlagType::Json).unwrap();
        assert_eq!(flag_value.as_json(), Some(&serde_json::json!({"max": 3})));

        // Declared type disagrees with the wire value.
        assert_eq!(Value::from(true).to_flag_value(FlagType::String), None);
    }

    #[test]
    fn flag_value_serializes_tagged() {
        let json = serde_json::to_value(FlagValue::Number(12.5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 12.5}));

        let json = serde_json::to_value(FlagValue::String("red".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "string", "value": "red"}));
    }
}
