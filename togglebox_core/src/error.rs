use std::sync::Arc;

use crate::Str;

/// Represents a result type for operations in the ToggleBox SDK.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// togglebox-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the ToggleBox SDK.
///
/// Pure evaluation functions ([`evaluate_flag`][crate::flags::evaluate_flag],
/// [`assign_variation`][crate::experiments::assign_variation]) never return errors; this enum
/// covers the orchestration surface (configuration fetching, lookups, client setup).
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The requested flag does not exist for the client's platform/environment.
    #[error("flag {flag_key:?} not found")]
    FlagNotFound {
        /// Key of the missing flag.
        flag_key: Str,
    },

    /// The requested experiment does not exist for the client's platform/environment.
    #[error("experiment {experiment_key:?} not found")]
    ExperimentNotFound {
        /// Key of the missing experiment.
        experiment_key: Str,
    },

    /// The requested remote config key does not exist for the client's platform/environment.
    #[error("config key {key:?} not found")]
    ConfigKeyNotFound {
        /// The missing config key.
        key: Str,
    },

    /// The flag exists but its declared type differs from the one requested by a typed getter.
    #[error("flag has invalid type (expected: {expected:?}, found: {found:?})")]
    TypeMismatch {
        /// Type requested by the caller.
        expected: crate::flags::FlagType,
        /// Type declared on the flag.
        found: crate::flags::FlagType,
    },

    /// The server sent a definition this SDK failed to parse. It is recommended to upgrade the
    /// ToggleBox SDK.
    #[error("error parsing configuration, try upgrading ToggleBox SDK")]
    ConfigurationParseError,

    /// Malformed client setup. Raised at construction time, never during evaluation.
    #[error("invalid client configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The request was unauthorized, possibly due to an invalid API key.
    #[error("unauthorized, api_key is likely invalid")]
    Unauthorized,

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl Error {
    /// Return `true` if the error is transient and the operation may be retried.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }
}
