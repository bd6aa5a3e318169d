use chrono::{DateTime, Utc};

use crate::experiments::ExperimentsResponse;
use crate::flags::FlagsResponse;
use crate::remote_config::RemoteConfigResponse;

/// All three configuration tiers fetched for one `(platform, environment)` pair.
///
/// Immutable once constructed; the store replaces whole snapshots, never mutates them, so a
/// reader holding an `Arc` to one tier gets a consistent view throughout an evaluation.
#[derive(Debug)]
pub struct Configuration {
    /// Timestamp when configuration was fetched by the SDK.
    pub fetched_at: DateTime<Utc>,
    /// Tier 1: remote config entries.
    pub remote_config: RemoteConfigResponse,
    /// Tier 2: feature flags.
    pub flags: FlagsResponse,
    /// Tier 3: experiments.
    pub experiments: ExperimentsResponse,
}

impl Configuration {
    /// Create a new configuration from server responses.
    pub fn from_server_response(
        remote_config: RemoteConfigResponse,
        flags: FlagsResponse,
        experiments: ExperimentsResponse,
    ) -> Configuration {
        Configuration {
            fetched_at: Utc::now(),
            remote_config,
            flags,
            experiments,
        }
    }
}
