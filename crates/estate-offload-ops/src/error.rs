//! Error types for property operations.

use serde::{Deserialize, Serialize};

/// Result type alias for property operations.
pub type Result<T> = std::result::Result<T, OpsError>;

/// Errors produced while decoding or running a property operation.
///
/// The serialized form is `{"kind": "...", "message": "..."}`, which is how
/// errors travel back from the background executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum OpsError {
    /// The input is not shaped like a property sequence.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation type is not one of the known kinds.
    #[error("Unsupported operation type '{0}'")]
    UnsupportedOperation(String),

    /// An operation-specific parameter could not be decoded.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl OpsError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedOperation(kind.into())
    }

    /// Create a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}
