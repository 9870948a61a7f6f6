//! Common error types for Archiva.

use thiserror::Error;

/// Top-level error type for Archiva storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level failure reaching a remote backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored secret could not be decrypted.
    ///
    /// Deliberately carries no detail about which check failed.
    #[error("Could not decrypt stored credential")]
    Decryption,

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A migration run was cancelled between file copies.
    #[error("Migration cancelled: {0}")]
    Cancelled(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error represents a missing resource.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
