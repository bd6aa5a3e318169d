//! `togglebox_core` is a common library to build ToggleBox SDKs for different languages. If
//! you're a ToggleBox user, you probably want to take a look at one of the existing SDKs.
//!
//! # Overview
//!
//! `togglebox_core` is organized as a set of building blocks that help to build ToggleBox
//! SDKs. Different languages have different constraints. Some languages might use all building
//! blocks and others might reimplement some pieces in the host language.
//!
//! ToggleBox serves three tiers: [remote config](remote_config) (key-value, no targeting),
//! [feature flags](flags) (two-value A/B with country/language/user targeting and percentage
//! rollout), and [experiments](experiments) (multi-variant with weighted traffic allocation and
//! control-group bookkeeping).
//!
//! The evaluation functions ([`flags::evaluate_flag`], [`experiments::assign_variation`]) are
//! pure: identical `(definition, context)` inputs always produce identical outputs. Together
//! with the stable hash in [`bucketer`], this gives sticky assignment without a persisted
//! per-user table. Because they are pure, they are safe to call concurrently from any number of
//! threads without synchronization.
//!
//! [`ConfigurationStore`](configuration_store::ConfigurationStore) is a thread-safe multi-reader
//! multi-writer in-memory manager for fetched definitions, with a short TTL per resource type.
//! When a reader gets a resource collection, it receives a *snapshot* that is not affected by
//! further writes—to provide a consistent response to the user, it is important that the reader
//! uses the same snapshot throughout the operation.
//!
//! [`ConfigurationFetcher`](configuration_fetcher::ConfigurationFetcher) is an HTTP client that
//! knows how to fetch definitions from the server. It's best to save and reuse the same
//! instance, so it can reuse the connection.
//!
//! [`PollerThread`](poller_thread::PollerThread) launches a background thread that periodically
//! fetches new definitions (using `ConfigurationFetcher`) and updates `ConfigurationStore`. This
//! is the simplest way to keep SDK configuration up-to-date.
//!
//! [`events`] module contains the recording contract between evaluation and the stats pipeline:
//! the [`EventSink`](events::EventSink) trait, the event shapes, a bounded drop-oldest queue and
//! a background batch dispatcher. Recording is fire-and-forget relative to evaluation.
//!
//! # Versioning
//!
//! This library follows semver. However, it is considered an internal library, so expect
//! frequent breaking changes and major version bumps.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod bucketer;
pub mod configuration_fetcher;
pub mod configuration_store;
pub mod events;
pub mod experiments;
pub mod flags;
pub mod poller_thread;
pub mod remote_config;

mod configuration;
mod context;
mod error;
mod sdk_metadata;
mod str;

pub use crate::str::Str;
pub use configuration::Configuration;
pub use context::{EvaluationContext, ANONYMOUS_USER};
pub use error::{Error, Result};
pub use sdk_metadata::SdkMetadata;
