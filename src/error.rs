//! Error handler for casbin-metrics.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecorderError>;

/// Type-erased error, used for failures reported by callers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by an [`Observer`](crate::recorder::Observer).
///
/// Kept apart from [`RecorderError`]: the recorder itself never fails once
/// built, it only relays what the observer returns.
pub type ObserverError = BoxError;

/// Enum representing recorder construction errors.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A family with the same name is already registered on the target
    /// registry.
    #[error("failed to register metric family: {0}")]
    Registration(#[source] prometheus::Error),

    /// An instrument could not be built, usually because of invalid
    /// histogram buckets.
    #[error("invalid metric definition: {0}")]
    Metric(#[from] prometheus::Error),
}

/// Enum representing configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot open configuration file")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid simulation address {address}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
}
