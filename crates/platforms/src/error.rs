use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Credential exchange failed or returned a malformed response.
    #[error("auth error: {0}")]
    Auth(String),
    /// The platform could not be reached (connect failure or timeout).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The platform answered with a non-success status other than 401.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatformError {
    /// Classify a transport error, separating connection-level failures
    /// from everything else.
    pub fn from_transport(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::Network(error)
        } else {
            Self::Http(error)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
