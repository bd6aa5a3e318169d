use std::sync::{Arc, Mutex};

use chrono::Utc;

use togglebox_core::configuration_fetcher::{ConfigurationFetcher, ConfigurationFetcherConfig};
use togglebox_core::configuration_store::ConfigurationStore;
use togglebox_core::events::{
    ConversionEvent, CustomEvent, EventSink, ExperimentExposureEvent, FlagEvaluationEvent,
};
use togglebox_core::experiments::{assign_variation, ExperimentsResponse, VariantAssignment};
use togglebox_core::flags::{
    evaluate_flag, FlagEvaluation, FlagType, FlagValue, FlagsResponse, TryParse, Value,
};
use togglebox_core::poller_thread::{PollerThreadConfig, RefreshNotice};
use togglebox_core::remote_config::RemoteConfigResponse;
use togglebox_core::{EvaluationContext, Str};

use crate::poller::PollerThread;
use crate::{ClientConfig, Error, Result, SDK_METADATA};

/// A client for the ToggleBox API.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// The client serves a single `(platform, environment)` pair and keeps a short-TTL cache of
/// definitions per resource type. A cache miss triggers a synchronous fetch; concurrent misses
/// are collapsed into one request (callers wait for the in-flight fetch and re-read the cache).
/// For long-running services, prefer [`Client::start_poller_thread`], which keeps the cache warm
/// in the background.
///
/// # Examples
/// ```no_run
/// # use togglebox::{Client, ClientConfig};
/// let client = ClientConfig::from_api_key("api-key")
///     .platform("web")
///     .environment("production")
///     .to_client()
///     .unwrap();
/// ```
pub struct Client {
    configuration_store: Arc<ConfigurationStore>,
    /// Shared with the poller thread; whoever holds the lock is the one refresh in flight.
    fetcher: Arc<Mutex<ConfigurationFetcher>>,
    event_sink: Arc<dyn EventSink + Send + Sync>,
    default_context: EvaluationContext,
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if platform or environment is unset.
    pub(crate) fn new(config: ClientConfig) -> Result<Self> {
        Client::new_inner(
            Arc::new(ConfigurationStore::with_ttl(config.cache_ttl)),
            config,
        )
    }

    #[cfg(test)]
    pub(crate) fn new_with_configuration_store(
        config: ClientConfig,
        configuration_store: Arc<ConfigurationStore>,
    ) -> Result<Self> {
        Client::new_inner(configuration_store, config)
    }

    fn new_inner(
        configuration_store: Arc<ConfigurationStore>,
        config: ClientConfig,
    ) -> Result<Self> {
        if config.platform.is_empty() {
            return Err(Error::InvalidConfiguration("platform must be set"));
        }
        if config.environment.is_empty() {
            return Err(Error::InvalidConfiguration("environment must be set"));
        }

        let fetcher = ConfigurationFetcher::new(ConfigurationFetcherConfig {
            base_url: config.base_url,
            api_key: config.api_key,
            platform: config.platform,
            environment: config.environment,
            sdk_metadata: SDK_METADATA,
        });

        Ok(Client {
            configuration_store,
            fetcher: Arc::new(Mutex::new(fetcher)),
            event_sink: config.event_sink,
            default_context: config.default_context,
        })
    }

    /// Evaluate a flag and return the full evaluation (served letter, value, reason).
    ///
    /// The per-call `context` is merged over the client's default context; per-call fields win.
    /// The evaluation is recorded through the event sink; recording never blocks or fails the
    /// call.
    ///
    /// # Errors
    ///
    /// - [`Error::FlagNotFound`] if the flag does not exist for this platform/environment.
    /// - [`Error::ConfigurationParseError`] if the server sent a flag this SDK cannot parse.
    /// - [`Error::Network`] / [`Error::Unauthorized`] if definitions could not be fetched.
    pub fn evaluate_flag(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<FlagEvaluation> {
        self.evaluate_flag_inner(flag_key, context, None)
    }

    /// Evaluate a boolean flag, serving `default` on any failure.
    ///
    /// This is the graceful-degradation wrapper: a missing flag, a type mismatch, or a fetch
    /// failure serves `default` instead of propagating the error.
    pub fn is_flag_enabled(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: bool,
    ) -> bool {
        self.get_boolean_value_or(flag_key, context, default)
    }

    /// Evaluate a boolean flag.
    ///
    /// # Errors
    ///
    /// Same as [`Client::evaluate_flag`], plus [`Error::TypeMismatch`] if the flag is not
    /// declared boolean. The type is checked before evaluation, so the error is returned even
    /// for contexts that would match no targeting.
    pub fn get_boolean_value(&self, flag_key: &str, context: &EvaluationContext) -> Result<bool> {
        let evaluation = self.evaluate_flag_inner(flag_key, context, Some(FlagType::Boolean))?;
        evaluation.value.as_boolean().ok_or(Error::TypeMismatch {
            expected: FlagType::Boolean,
            found: evaluation.value.flag_type(),
        })
    }

    /// Boolean flag with graceful degradation to `default`.
    pub fn get_boolean_value_or(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: bool,
    ) -> bool {
        self.get_boolean_value(flag_key, context)
            .unwrap_or_else(|err| {
                log::warn!(target: "togglebox",
                           flag_key;
                           "failed to evaluate flag, serving default: {err}");
                default
            })
    }

    /// Evaluate a string flag.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_value`], for the string type.
    pub fn get_string_value(&self, flag_key: &str, context: &EvaluationContext) -> Result<Str> {
        let evaluation = self.evaluate_flag_inner(flag_key, context, Some(FlagType::String))?;
        evaluation
            .value
            .as_str()
            .map(Str::from)
            .ok_or(Error::TypeMismatch {
                expected: FlagType::String,
                found: evaluation.value.flag_type(),
            })
    }

    /// String flag with graceful degradation to `default`.
    pub fn get_string_value_or(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: impl Into<Str>,
    ) -> Str {
        self.get_string_value(flag_key, context).unwrap_or_else(|err| {
            log::warn!(target: "togglebox",
                       flag_key;
                       "failed to evaluate flag, serving default: {err}");
            default.into()
        })
    }

    /// Evaluate a number flag.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_value`], for the number type.
    pub fn get_number_value(&self, flag_key: &str, context: &EvaluationContext) -> Result<f64> {
        let evaluation = self.evaluate_flag_inner(flag_key, context, Some(FlagType::Number))?;
        evaluation.value.as_number().ok_or(Error::TypeMismatch {
            expected: FlagType::Number,
            found: evaluation.value.flag_type(),
        })
    }

    /// Number flag with graceful degradation to `default`.
    pub fn get_number_value_or(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: f64,
    ) -> f64 {
        self.get_number_value(flag_key, context).unwrap_or_else(|err| {
            log::warn!(target: "togglebox",
                       flag_key;
                       "failed to evaluate flag, serving default: {err}");
            default
        })
    }

    /// Evaluate a JSON flag.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_value`], for the JSON type.
    pub fn get_json_value(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<Arc<serde_json::Value>> {
        let evaluation = self.evaluate_flag_inner(flag_key, context, Some(FlagType::Json))?;
        match evaluation.value {
            FlagValue::Json { raw: _, parsed } => Ok(parsed),
            other => Err(Error::TypeMismatch {
                expected: FlagType::Json,
                found: other.flag_type(),
            }),
        }
    }

    /// Assign the user to an experiment variation, or `None` if they are not in the experiment
    /// (ineligible or in a traffic allocation gap).
    ///
    /// Every non-`None` assignment is reported as an exposure through the event sink, once per
    /// call; deduplication of repeated exposures is the recording layer's concern.
    ///
    /// Unlike the flag getters, there is no sensible default to degrade to, so fetch failures
    /// propagate to the caller.
    ///
    /// # Errors
    ///
    /// - [`Error::ExperimentNotFound`] if the experiment does not exist.
    /// - [`Error::ConfigurationParseError`] if the server sent an experiment this SDK cannot
    ///   parse.
    /// - [`Error::Network`] / [`Error::Unauthorized`] if definitions could not be fetched.
    pub fn get_variant(
        &self,
        experiment_key: &str,
        context: &EvaluationContext,
    ) -> Result<Option<VariantAssignment>> {
        let experiments = self.experiments()?;
        let experiment = lookup(&experiments.experiments, experiment_key, || {
            Error::ExperimentNotFound {
                experiment_key: experiment_key.into(),
            }
        })?;

        let context = self.default_context.merge(context);
        let Some(assignment) = assign_variation(experiment, &context) else {
            return Ok(None);
        };

        self.event_sink
            .track_experiment_exposure(ExperimentExposureEvent {
                experiment_key: assignment.experiment_key.clone(),
                variation_key: assignment.variation_key.clone(),
                user_id: context.user_id().into(),
                timestamp: Utc::now(),
            });

        Ok(Some(assignment))
    }

    /// Record a conversion for the given experiment metric.
    ///
    /// The user's variation is recomputed deterministically; a user not in the experiment
    /// produces no event. `value` should be set only for sum/average metric types.
    ///
    /// Fire-and-forget: all failures are swallowed and logged, never surfaced to the caller.
    pub fn track_conversion(
        &self,
        experiment_key: &str,
        context: &EvaluationContext,
        metric_id: &str,
        value: Option<f64>,
    ) {
        let result = (|| -> Result<()> {
            let experiments = self.experiments()?;
            let experiment = lookup(&experiments.experiments, experiment_key, || {
                Error::ExperimentNotFound {
                    experiment_key: experiment_key.into(),
                }
            })?;

            let context = self.default_context.merge(context);
            // Recompute the assignment instead of calling get_variant() so conversions don't
            // double as exposures.
            let Some(assignment) = assign_variation(experiment, &context) else {
                log::trace!(target: "togglebox",
                            experiment_key,
                            user_id = context.user_id();
                            "conversion from user not in experiment, skipping");
                return Ok(());
            };

            self.event_sink.track_conversion(ConversionEvent {
                experiment_key: assignment.experiment_key.clone(),
                metric_id: metric_id.into(),
                variation_key: assignment.variation_key.clone(),
                user_id: context.user_id().into(),
                value,
                timestamp: Utc::now(),
            });
            Ok(())
        })();

        if let Err(err) = result {
            log::warn!(target: "togglebox",
                       experiment_key,
                       metric_id;
                       "failed to track conversion: {err}");
        }
    }

    /// Record an application-defined event, matched to experiment metrics by name downstream.
    ///
    /// Fire-and-forget.
    pub fn track_event(
        &self,
        event_name: &str,
        context: &EvaluationContext,
        data: Option<serde_json::Value>,
    ) {
        let context = self.default_context.merge(context);
        self.event_sink.track_event(CustomEvent {
            event_name: event_name.into(),
            user_id: context.user_id().into(),
            data,
            timestamp: Utc::now(),
        });
    }

    /// Get a Tier 1 remote config value.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigKeyNotFound`] if the key does not exist.
    /// - [`Error::Network`] / [`Error::Unauthorized`] if definitions could not be fetched.
    pub fn get_config_value(&self, key: &str) -> Result<Value> {
        let remote_config = self.remote_config()?;
        remote_config
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ConfigKeyNotFound { key: key.into() })
    }

    /// Remote config value with graceful degradation to `default`.
    pub fn get_config_value_or(&self, key: &str, default: Value) -> Value {
        self.get_config_value(key).unwrap_or_else(|err| {
            log::warn!(target: "togglebox",
                       key;
                       "failed to get config value, serving default: {err}");
            default
        })
    }

    /// Start a background thread that keeps all three tiers fresh.
    ///
    /// The poller shares this client's fetcher, so an on-demand refresh and a poll tick never
    /// run concurrently. It is recommended to call
    /// [`PollerThread::wait_for_configuration`] before the first evaluation.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the poller thread failed to start.
    pub fn start_poller_thread(&self) -> Result<PollerThread> {
        PollerThread::start(self.fetcher.clone(), self.configuration_store.clone())
    }

    /// Same as [`Client::start_poller_thread`], with an explicit poll interval/jitter and an
    /// optional channel receiving a [`RefreshNotice`] after every refresh.
    ///
    /// Notices are delivered with a non-blocking send; a full channel drops the notice rather
    /// than stalling the poller.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the poller thread failed to start.
    pub fn start_poller_thread_with_config(
        &self,
        config: PollerThreadConfig,
        notices: Option<std::sync::mpsc::SyncSender<RefreshNotice>>,
    ) -> Result<PollerThread> {
        PollerThread::start_with_config(
            self.fetcher.clone(),
            self.configuration_store.clone(),
            config,
            notices,
        )
    }

    fn evaluate_flag_inner(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        expected_type: Option<FlagType>,
    ) -> Result<FlagEvaluation> {
        let flags = self.flags()?;
        let flag = lookup(&flags.flags, flag_key, || Error::FlagNotFound {
            flag_key: flag_key.into(),
        })?;

        if let Some(expected) = expected_type {
            if flag.flag_type != expected {
                return Err(Error::TypeMismatch {
                    expected,
                    found: flag.flag_type,
                });
            }
        }

        let context = self.default_context.merge(context);
        let evaluation = evaluate_flag(flag, &context);

        self.event_sink.track_flag_evaluation(FlagEvaluationEvent {
            flag_key: evaluation.flag_key.clone(),
            served_value: evaluation.served_value,
            user_id: context.user_id().into(),
            country: context.country.clone(),
            language: context.language.clone(),
            timestamp: Utc::now(),
        });

        Ok(evaluation)
    }

    fn flags(&self) -> Result<Arc<FlagsResponse>> {
        if let Some(flags) = self.configuration_store.get_flags() {
            return Ok(flags);
        }
        let mut fetcher = self.lock_fetcher();
        // Another caller may have refreshed while we waited for the lock.
        if let Some(flags) = self.configuration_store.get_flags() {
            return Ok(flags);
        }
        let response = Arc::new(fetcher.fetch_flags()?);
        self.configuration_store.set_flags(response.clone());
        Ok(response)
    }

    fn experiments(&self) -> Result<Arc<ExperimentsResponse>> {
        if let Some(experiments) = self.configuration_store.get_experiments() {
            return Ok(experiments);
        }
        let mut fetcher = self.lock_fetcher();
        if let Some(experiments) = self.configuration_store.get_experiments() {
            return Ok(experiments);
        }
        let response = Arc::new(fetcher.fetch_experiments()?);
        self.configuration_store.set_experiments(response.clone());
        Ok(response)
    }

    fn remote_config(&self) -> Result<Arc<RemoteConfigResponse>> {
        if let Some(remote_config) = self.configuration_store.get_remote_config() {
            return Ok(remote_config);
        }
        let mut fetcher = self.lock_fetcher();
        if let Some(remote_config) = self.configuration_store.get_remote_config() {
            return Ok(remote_config);
        }
        let response = Arc::new(fetcher.fetch_remote_config()?);
        self.configuration_store.set_remote_config(response.clone());
        Ok(response)
    }

    /// Single-flight guard: at most one refresh is in flight; everyone else waits and re-checks
    /// the store.
    fn lock_fetcher(&self) -> std::sync::MutexGuard<'_, ConfigurationFetcher> {
        self.fetcher
            .lock()
            .expect("thread holding fetcher lock should not panic")
    }
}

fn lookup<'a, T>(
    collection: &'a std::collections::HashMap<Str, TryParse<T>>,
    key: &str,
    not_found: impl FnOnce() -> Error,
) -> Result<&'a T> {
    match collection.get(key) {
        Some(TryParse::Parsed(value)) => Ok(value),
        Some(TryParse::ParseFailed(_)) => Err(Error::ConfigurationParseError),
        None => Err(not_found()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use togglebox_core::configuration_store::ConfigurationStore;
    use togglebox_core::events::{
        ConversionEvent, CustomEvent, EventSink, ExperimentExposureEvent, FlagEvaluationEvent,
        TrackingEvent,
    };
    use togglebox_core::experiments::{
        Experiment, ExperimentStatus, ExperimentTargeting, ExperimentsResponse, TrafficSplit,
        Variation,
    };
    use togglebox_core::flags::{
        CountryRule, Flag, FlagType, FlagsResponse, ServedValue, Targeting, TryParse,
    };
    use togglebox_core::remote_config::RemoteConfigResponse;
    use togglebox_core::EvaluationContext;

    use crate::{Client, ClientConfig, Error};

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<Mutex<Vec<TrackingEvent>>>);

    impl RecordingSink {
        fn events(&self) -> Vec<TrackingEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn track_flag_evaluation(&self, event: FlagEvaluationEvent) {
            self.0.lock().unwrap().push(TrackingEvent::FlagEvaluation(event));
        }
        fn track_experiment_exposure(&self, event: ExperimentExposureEvent) {
            self.0.lock().unwrap().push(TrackingEvent::ExperimentExposure(event));
        }
        fn track_conversion(&self, event: ConversionEvent) {
            self.0.lock().unwrap().push(TrackingEvent::Conversion(event));
        }
        fn track_event(&self, event: CustomEvent) {
            self.0.lock().unwrap().push(TrackingEvent::Custom(event));
        }
    }

    fn color_flag() -> Flag {
        Flag {
            flag_key: "button-color".into(),
            enabled: true,
            flag_type: FlagType::String,
            value_a: "red".into(),
            value_b: "blue".into(),
            default_value: ServedValue::A,
            targeting: Targeting {
                countries: vec![CountryRule {
                    country: "CA".into(),
                    serve_value: ServedValue::B,
                    languages: vec![],
                }],
                force_include_users: vec![],
                force_exclude_users: vec![],
            },
            rollout_enabled: false,
            rollout_percentage_a: 0.0,
            rollout_percentage_b: 0.0,
            version: "v1".into(),
        }
    }

    fn full_experiment() -> Experiment {
        Experiment {
            experiment_key: "checkout-cta".into(),
            status: ExperimentStatus::Running,
            variations: vec![
                Variation {
                    key: "control".into(),
                    name: "Control".into(),
                    value: "old".into(),
                    is_control: true,
                },
                Variation {
                    key: "treatment".into(),
                    name: "Treatment".into(),
                    value: "new".into(),
                    is_control: false,
                },
            ],
            control_variation: "control".into(),
            traffic_allocation: vec![
                TrafficSplit {
                    variation_key: "control".into(),
                    percentage: 50.0,
                },
                TrafficSplit {
                    variation_key: "treatment".into(),
                    percentage: 50.0,
                },
            ],
            targeting: ExperimentTargeting::default(),
            primary_metric: None,
            secondary_metrics: vec![],
            confidence_level: 0.95,
            winner: None,
        }
    }

    fn populated_store() -> Arc<ConfigurationStore> {
        let store = Arc::new(ConfigurationStore::new());

        let mut flags = FlagsResponse::default();
        flags
            .flags
            .insert("button-color".into(), TryParse::Parsed(color_flag()));
        store.set_flags(Arc::new(flags));

        let mut experiments = ExperimentsResponse::default();
        experiments
            .experiments
            .insert("checkout-cta".into(), TryParse::Parsed(full_experiment()));
        store.set_experiments(Arc::new(experiments));

        let mut remote_config = RemoteConfigResponse::default();
        remote_config.entries.insert("maxRetries".into(), 3.0.into());
        store.set_remote_config(Arc::new(remote_config));

        store
    }

    fn test_client(store: Arc<ConfigurationStore>, sink: RecordingSink) -> Client {
        // Unroutable base URL: any cache miss fails fast instead of hitting the network.
        let config = ClientConfig::from_api_key("api-key")
            .base_url("http://127.0.0.1:9/api")
            .platform("web")
            .environment("test")
            .default_context(EvaluationContext::anonymous().with_country("CA"))
            .event_sink(sink);
        Client::new_with_configuration_store(config, store).unwrap()
    }

    #[test]
    fn missing_platform_is_a_construction_error() {
        let result = ClientConfig::from_api_key("api-key")
            .environment("test")
            .to_client();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn flag_evaluation_merges_default_context_and_records() {
        let sink = RecordingSink::default();
        let client = test_client(populated_store(), sink.clone());

        // Country CA comes from the client-level default context.
        let value = client
            .get_string_value("button-color", &EvaluationContext::new("u2"))
            .unwrap();
        assert_eq!(value, "blue");

        // Per-call country wins over the default.
        let value = client
            .get_string_value(
                "button-color",
                &EvaluationContext::new("u2").with_country("FR"),
            )
            .unwrap();
        assert_eq!(value, "red");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            TrackingEvent::FlagEvaluation(event) => {
                assert_eq!(event.flag_key, "button-color");
                assert_eq!(event.served_value, ServedValue::B);
                assert_eq!(event.user_id, "u2");
                assert_eq!(event.country.as_deref(), Some("CA"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn typed_getter_rejects_wrong_type() {
        let client = test_client(populated_store(), RecordingSink::default());

        let result = client.get_boolean_value("button-color", &EvaluationContext::new("u1"));
        assert!(matches!(
            result,
            Err(Error::TypeMismatch {
                expected: FlagType::Boolean,
                found: FlagType::String,
            })
        ));
    }

    #[test]
    fn is_flag_enabled_degrades_to_default_on_fetch_failure() {
        // Empty store and unreachable server: every lookup fails.
        let store = Arc::new(ConfigurationStore::new());
        let client = test_client(store, RecordingSink::default());

        let context = EvaluationContext::new("u1");
        assert!(!client.is_flag_enabled("button-color", &context, false));
        assert!(client.is_flag_enabled("button-color", &context, true));
    }

    #[test]
    fn get_variant_propagates_fetch_failure() {
        let store = Arc::new(ConfigurationStore::new());
        let client = test_client(store, RecordingSink::default());

        let result = client.get_variant("checkout-cta", &EvaluationContext::new("u1"));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_flag_degrades_in_or_getters_but_errors_in_plain_getters() {
        let client = test_client(populated_store(), RecordingSink::default());
        let context = EvaluationContext::new("u1");

        assert_eq!(
            client.get_string_value_or("missing-flag", &context, "fallback"),
            "fallback"
        );
        assert!(matches!(
            client.get_string_value("missing-flag", &context),
            Err(Error::FlagNotFound { .. })
        ));
    }

    #[test]
    fn get_variant_records_exposure_once_per_call() {
        let sink = RecordingSink::default();
        let client = test_client(populated_store(), sink.clone());

        let context = EvaluationContext::new("u1");
        let assignment = client.get_variant("checkout-cta", &context).unwrap().unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            TrackingEvent::ExperimentExposure(event) => {
                assert_eq!(event.experiment_key, "checkout-cta");
                assert_eq!(event.variation_key, assignment.variation_key);
                assert_eq!(event.user_id, "u1");
            }
            other => panic!("unexpected event {other:?}"),
        }

        // No deduplication in the client: a second call records a second exposure.
        client.get_variant("checkout-cta", &context).unwrap().unwrap();
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn track_conversion_attributes_the_recomputed_variation() {
        let sink = RecordingSink::default();
        let client = test_client(populated_store(), sink.clone());

        let context = EvaluationContext::new("u1");
        let assignment = client.get_variant("checkout-cta", &context).unwrap().unwrap();

        client.track_conversion("checkout-cta", &context, "purchases", Some(19.99));

        let events = sink.events();
        match events.last().unwrap() {
            TrackingEvent::Conversion(event) => {
                assert_eq!(event.variation_key, assignment.variation_key);
                assert_eq!(event.metric_id, "purchases");
                assert_eq!(event.value, Some(19.99));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn track_conversion_swallows_all_failures() {
        let store = Arc::new(ConfigurationStore::new());
        let sink = RecordingSink::default();
        let client = test_client(store, sink.clone());

        // Fetch fails; nothing recorded, nothing propagated.
        client.track_conversion("checkout-cta", &EvaluationContext::new("u1"), "m1", None);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn config_values_come_from_tier_one() {
        let client = test_client(populated_store(), RecordingSink::default());

        use togglebox_core::flags::Value;

        assert_eq!(client.get_config_value("maxRetries").unwrap(), Value::from(3.0));
        assert!(matches!(
            client.get_config_value("missing"),
            Err(Error::ConfigKeyNotFound { .. })
        ));
        assert_eq!(
            client.get_config_value_or("missing", Value::from(5.0)),
            Value::from(5.0)
        );
    }

    #[test]
    fn track_event_records_with_merged_context() {
        let sink = RecordingSink::default();
        let client = test_client(populated_store(), sink.clone());

        client.track_event(
            "add_to_cart",
            &EvaluationContext::new("u7"),
            Some(serde_json::json!({"sku": "A-1"})),
        );

        match sink.events().last().unwrap() {
            TrackingEvent::Custom(event) => {
                assert_eq!(event.event_name, "add_to_cart");
                assert_eq!(event.user_id, "u7");
                assert_eq!(event.data, Some(serde_json::json!({"sku": "A-1"})));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
