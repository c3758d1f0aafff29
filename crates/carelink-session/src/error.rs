//! Error types for carelink-session

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session error types
///
/// Storage variants never reach callers of [`crate::storage::CredentialStore`];
/// the adapters log and swallow them. They surface only from the fallible
/// helpers underneath and from the settings and HTTP layers.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("Cookie rejected: {0}")]
    CookieRejected(String),

    #[error("No credential stored")]
    MissingCredential,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend responded with status {0}")]
    NonOkResponse(u16),

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
