//! Application-wide error types.

use reqwest::StatusCode;
use stream_platforms::PlatformError;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Webhook request failed: {0}")]
    WebhookRequest(#[from] reqwest::Error),

    #[error("Webhook {operation} returned {status}: {body}")]
    Webhook {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("No notification message is tracked for {operation}")]
    MissingMessageId { operation: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
