use std::sync::Arc;
use std::time::Duration;

use togglebox_core::configuration_store::ConfigurationStore;
use togglebox_core::events::{EventSink, NoopEventSink};
use togglebox_core::EvaluationContext;

use crate::{Client, Result};

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use togglebox::ClientConfig;
/// let client = ClientConfig::from_api_key("api-key")
///     .platform("web")
///     .environment("production")
///     .to_client()
///     .unwrap();
/// ```
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) platform: String,
    pub(crate) environment: String,
    pub(crate) cache_ttl: Duration,
    pub(crate) default_context: EvaluationContext,
    pub(crate) event_sink: Arc<dyn EventSink + Send + Sync>,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str =
        togglebox_core::configuration_fetcher::DEFAULT_BASE_URL;

    /// Create a default ToggleBox configuration using the specified API key.
    ///
    /// Platform and environment have no defaults and must be set before
    /// [`ClientConfig::to_client`].
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            platform: String::new(),
            environment: String::new(),
            cache_ttl: ConfigurationStore::DEFAULT_TTL,
            default_context: EvaluationContext::anonymous(),
            event_sink: Arc::new(NoopEventSink),
        }
    }

    /// Set the platform this client serves (e.g., "web", "ios"). Required.
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the environment this client serves (e.g., "production"). Required.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override how long fetched definitions are served before a refetch.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the client-level default context. Per-call contexts are merged over it, with per-call
    /// fields winning.
    pub fn default_context(mut self, context: EvaluationContext) -> Self {
        self.default_context = context;
        self
    }

    /// Set the sink receiving evaluation/exposure/conversion events.
    ///
    /// The sink is called on the evaluation path and must not block; see
    /// [`EventSink`] for the contract.
    pub fn event_sink(mut self, sink: impl EventSink + Send + Sync + 'static) -> Self {
        self.event_sink = Arc::new(sink);
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`][togglebox_core::Error::InvalidConfiguration] if
    /// platform or environment is missing. Client setup problems surface here, at construction,
    /// never during evaluation.
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }
}
