//! Error types for the offload mechanism.

use std::path::PathBuf;

use estate_offload_ops::OpsError;

/// Result type alias for offload operations.
pub type Result<T> = std::result::Result<T, OffloadError>;

/// Errors reported by the executor and the dispatch coordinator.
///
/// Every variant is non-fatal for callers: filter, search and sort callbacks
/// receive their original input alongside the error, stats callbacks receive
/// the error alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OffloadError {
    /// The background executor could not be created.
    ///
    /// The coordinator recovers from this by switching to the same-thread
    /// fallback. It is only ever returned from executor construction.
    #[error("Background executor unavailable: {0}")]
    StartupUnavailable(String),

    /// The background executor failed while processing a request.
    #[error("Background executor fault: {0}")]
    RuntimeFault(String),

    /// The operation itself was rejected.
    #[error(transparent)]
    Operation(#[from] OpsError),

    /// A result envelope could not be decoded or did not match its request.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl OffloadError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether this error means the executor is gone for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StartupUnavailable(_) | Self::RuntimeFault(_))
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has the wrong shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an out-of-range error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}
