//! An HTTP client that fetches configuration from the server.
use std::time::Duration;

use rand::{thread_rng, Rng};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::configuration::Configuration;
use crate::experiments::ExperimentsResponse;
use crate::flags::FlagsResponse;
use crate::remote_config::RemoteConfigResponse;
use crate::{Error, Result, SdkMetadata};

pub struct ConfigurationFetcherConfig {
    pub base_url: String,
    pub api_key: String,
    /// Platform the client serves (e.g., "web", "ios").
    pub platform: String,
    /// Environment the client serves (e.g., "production", "staging").
    pub environment: String,
    pub sdk_metadata: SdkMetadata,
}

pub const DEFAULT_BASE_URL: &str = "https://cdn.togglebox.dev/api";

const REMOTE_CONFIG_ENDPOINT: &str = "/v1/config";
const FLAGS_ENDPOINT: &str = "/v1/flags";
const EXPERIMENTS_ENDPOINT: &str = "/v1/experiments";

/// Transient network errors are retried with exponential backoff up to this many attempts.
const MAX_FETCH_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// A client that fetches ToggleBox configuration from the server.
pub struct ConfigurationFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: ConfigurationFetcherConfig,
    /// If we receive a 401 Unauthorized error during a request, it means the API key is not
    /// valid. We cache this error so we don't issue additional requests to the server.
    unauthorized: bool,
}

impl ConfigurationFetcher {
    pub fn new(config: ConfigurationFetcherConfig) -> ConfigurationFetcher {
        let client = reqwest::blocking::Client::new();

        ConfigurationFetcher {
            client,
            config,
            unauthorized: false,
        }
    }

    /// Fetch all three configuration tiers.
    pub fn fetch_configuration(&mut self) -> Result<Configuration> {
        let remote_config = self.fetch_remote_config()?;
        let flags = self.fetch_flags()?;
        let experiments = self.fetch_experiments()?;

        Ok(Configuration::from_server_response(
            remote_config,
            flags,
            experiments,
        ))
    }

    /// Fetch Tier 1 remote config entries.
    pub fn fetch_remote_config(&mut self) -> Result<RemoteConfigResponse> {
        self.fetch_resource(REMOTE_CONFIG_ENDPOINT)
    }

    /// Fetch Tier 2 flag definitions.
    pub fn fetch_flags(&mut self) -> Result<FlagsResponse> {
        self.fetch_resource(FLAGS_ENDPOINT)
    }

    /// Fetch Tier 3 experiment definitions.
    pub fn fetch_experiments(&mut self) -> Result<ExperimentsResponse> {
        self.fetch_resource(EXPERIMENTS_ENDPOINT)
    }

    fn fetch_resource<T: DeserializeOwned>(&mut self, endpoint: &str) -> Result<T> {
        if self.unauthorized {
            return Err(Error::Unauthorized);
        }

        let url = Url::parse_with_params(
            &format!("{}{}", self.config.base_url, endpoint),
            &[
                ("apiKey", &*self.config.api_key),
                ("platform", &*self.config.platform),
                ("environment", &*self.config.environment),
                ("sdkName", self.config.sdk_metadata.name),
                ("sdkVersion", self.config.sdk_metadata.version),
                ("coreVersion", env!("CARGO_PKG_VERSION")),
            ],
        )
        .map_err(Error::InvalidBaseUrl)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(url.clone()) {
                Err(err) if err.is_transient() && attempt < MAX_FETCH_ATTEMPTS => {
                    let backoff = backoff_with_jitter(BACKOFF_BASE * 2u32.pow(attempt - 1));
                    log::debug!(target: "togglebox",
                                endpoint,
                                attempt;
                                "transient fetch error, retrying in {backoff:?}: {err}");
                    std::thread::sleep(backoff);
                }
                result => return result,
            }
        }
    }

    fn fetch_once<T: DeserializeOwned>(&mut self, url: Url) -> Result<T> {
        log::debug!(target: "togglebox", "fetching configuration from {}", url.path());
        let response = self.client.get(url).send()?;

        let response = response.error_for_status().map_err(|err| {
            if err.status() == Some(StatusCode::UNAUTHORIZED) {
                log::warn!(target: "togglebox", "client is not authorized. Check your API key");
                self.unauthorized = true;
                Error::Unauthorized
            } else {
                log::warn!(target: "togglebox", "received non-200 response while fetching new configuration: {:?}", err);
                Error::from(err)
            }
        })?;

        let parsed = response.json()?;

        log::debug!(target: "togglebox", "successfully fetched configuration");

        Ok(parsed)
    }
}

/// Apply multiplicative jitter in `[0.5, 1.5)` so retries from a fleet of clients don't
/// synchronize.
fn backoff_with_jitter(backoff: Duration) -> Duration {
    backoff.mul_f64(thread_rng().gen_range(0.5..1.5))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[test]
    fn backoff_jitter_stays_bounded() {
        let backoff = Duration::from_millis(200);
        for _ in 0..100 {
            let jittered = super::backoff_with_jitter(backoff);
            assert!(jittered >= backoff / 2, "{jittered:?} below half backoff");
            assert!(jittered <= backoff * 3 / 2, "{jittered:?} above 1.5x backoff");
        }
    }
}
