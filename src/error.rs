//! Error types for the shopchat gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or malformed input, rejected before any side effect
    #[error("invalid request: {0}")]
    Validation(String),

    /// Messaging provider unreachable or answered with an error
    #[error("provider error: {0}")]
    Provider(String),

    /// Messaging provider refused to deliver (usually a disconnected device)
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// AI completion service failure
    #[error("ai error: {0}")]
    Ai(String),

    /// An optional collaborator is not configured
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Upload storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
