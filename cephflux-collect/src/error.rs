//! Error types for cluster state sources.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading cluster state from a dump.
#[derive(Debug, Error)]
pub enum StateError {
    /// The dump file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dump is not valid cluster state JSON.
    #[error("Failed to parse cluster state: {0}")]
    Parse(#[from] serde_json::Error),

    /// A daemon name is not of the form `<type>.<id>`.
    #[error("Invalid daemon name: {0:?}")]
    DaemonName(String),
}
