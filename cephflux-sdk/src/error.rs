//! Error types for configuration, persistence and delivery.

use std::path::PathBuf;

use thiserror::Error;

/// A configuration change that was rejected.
///
/// Rejected changes leave the running configuration untouched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The key is not a known setting.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The value could not be parsed or is out of range for the key.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The requested interval is below the floor.
    #[error("Interval {requested}s is below the minimum of {minimum}s")]
    IntervalTooShort { requested: u64, minimum: u64 },

    /// A destination without a hostname.
    #[error("Destination hostname must not be empty")]
    EmptyHostname,

    /// A destination with this hostname is already registered.
    #[error("Destination {0} is already registered")]
    DuplicateHostname(String),

    /// The change was valid but could not be saved.
    #[error("Failed to persist configuration: {0}")]
    Persist(#[from] StoreError),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Neither a registered destination nor a default hostname is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No InfluxDB server configured, please set one using: config-set hostname <hostname>")]
pub struct NoDestinationConfigured;

/// [`Exporter::start`](crate::Exporter::start) was called while a loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Collection loop is already running")]
pub struct AlreadyRunning;

/// Errors reading or writing persisted configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid stored configuration: {0}")]
    Format(#[from] serde_json::Error),
}

/// Errors returned by a time-series client.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The host could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The target database does not exist.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// The server refused the write (authorization, bad data, quota).
    #[error("Write rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}
