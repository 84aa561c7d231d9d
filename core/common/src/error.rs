//! Common error types for wasmpress.

use thiserror::Error;

/// Top-level error type for wasmpress operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider or module configuration is missing or invalid.
    /// Raised synchronously, before any I/O is attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A data operation was attempted on a provider that is not connected.
    #[error("Provider not connected: {0}")]
    NotConnected(String),

    /// Network or HTTP failure, carrying the status/text from the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication with a remote backend failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote backend refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Module framework operation failed.
    #[error("Module error: {0}")]
    Module(String),

    /// Module dependency graph contains a cycle.
    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    /// Operation is not supported by this backend.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
