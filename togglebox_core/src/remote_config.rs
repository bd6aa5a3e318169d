//! Tier 1: environment-wide key-value settings with no per-user targeting.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::flags::Value;
use crate::Str;

/// Response format of the remote config endpoint: every setting for a `(platform, environment)`
/// pair, keyed by config key.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfigResponse {
    pub entries: HashMap<Str, Value>,
}

impl RemoteConfigResponse {
    /// Look up a config value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }
}
