//! The Rust SDK for ToggleBox, a three-tier feature-management platform: remote config, feature
//! flags, and experiments.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] bound to one `(platform, environment)` pair. Tier 1
//! values are read with [`Client::get_config_value`]; Tier 2 flags resolve to one of two values
//! per user context via [`Client::evaluate_flag`] and the typed getters; Tier 3 experiments
//! assign a user to one of N weighted variations via [`Client::get_variant`].
//!
//! Flag resolution and variation assignment are deterministic: the same definition and context
//! always produce the same result, so users see consistent values without any per-user storage.
//!
//! # Typed flag values
//!
//! Every ToggleBox flag declares a value type on creation. Reads in code should use the
//! corresponding typed getter:
//! - [`Client::get_boolean_value()`]
//! - [`Client::get_string_value()`]
//! - [`Client::get_number_value()`]
//! - [`Client::get_json_value()`]
//!
//! These check the declared type before evaluating, so a mismatch is reported even for contexts
//! the flag would not target. The `*_or` variants and [`Client::is_flag_enabled`] degrade to a
//! caller-supplied default instead of returning errors; [`Client::get_variant`] has no sensible
//! default and propagates failures.
//!
//! # Event sink
//!
//! An [`EventSink`] should be provided to forward evaluations, exposures, and conversions to
//! your stats pipeline. Sinks are called on the evaluation path and must never block; the
//! [`BoundedEventQueue`] paired with an [`EventDispatcher`] gives a drop-oldest queue with
//! background batch delivery.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! In production, it is recommended to use the degrading (`*_or`) call forms on hot paths, as
//! feature flag evaluation should not be critical enough to cause system crashes. However, the
//! returned errors are valuable for debugging and usually indicate that developer's attention is
//! needed.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod poller;

#[doc(inline)]
pub use togglebox_core::{
    events::{
        BoundedEventQueue, ConversionEvent, CustomEvent, EventDispatcher, EventDispatcherConfig,
        EventSink, ExperimentExposureEvent, FlagEvaluationEvent, NoopEventSink, TrackingEvent,
    },
    experiments::VariantAssignment,
    flags::{FlagEvaluation, FlagType, FlagValue, ServedValue, Value},
    poller_thread::{PollerThreadConfig, RefreshNotice},
    EvaluationContext, Error, Result, Str,
};

pub use client::Client;
pub use config::ClientConfig;
pub use poller::PollerThread;

pub(crate) const SDK_METADATA: togglebox_core::SdkMetadata = togglebox_core::SdkMetadata {
    name: "rust",
    version: env!("CARGO_PKG_VERSION"),
};
