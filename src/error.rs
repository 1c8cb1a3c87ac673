//! ReplGate Error Types

use thiserror::Error;

/// Result type alias for ReplGate operations
pub type Result<T> = std::result::Result<T, Error>;

/// ReplGate error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // Routing errors
    #[error("Unknown strategy: {name}. Available: {available}")]
    UnknownStrategy { name: String, available: String },

    // Gateway errors
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Proxy unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Proxy returned {status}: {body}")]
    Upstream { status: u16, body: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable by a caller.
    /// The gateway and router never retry on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_) | Error::UpstreamUnavailable(_)
        )
    }
}
