//! Error types for biogate adapters and collaborators
//!
//! These errors never reach the caller of the authenticator's public
//! operations. They are returned by storage, vault and platform collaborators
//! and are recovered (logged, defaulted) inside the adapters.

use thiserror::Error;

/// Result type alias for collaborator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by storage, vault and platform collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cryptographic error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Durable key-value store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Secure vault failure
    #[error("Vault error: {0}")]
    Vault(String),

    /// Platform biometric API failure
    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
