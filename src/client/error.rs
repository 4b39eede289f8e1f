use serde_json::Value;
use thiserror::Error;

/// Failure of an [`ApiClient`](super::ApiClient) call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway answered with a 3xx; usually a trailing slash mismatch.
    #[error("Unexpected redirect ({status}) to {}", .location.as_deref().unwrap_or("<none>"))]
    Redirect { status: u16, location: Option<String> },

    /// Session refresh failed or the retried request was still rejected.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Terminal non-2xx response. `body` is the parsed JSON, or the raw text.
    #[error("Request failed with status {status}")]
    Status { status: u16, body: Value },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Every attempt hit a retryable status.
    #[error("Backend unavailable ({status}) after {attempts} attempts")]
    Exhausted { status: u16, attempts: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Redirect { status, .. }
            | ClientError::Status { status, .. }
            | ClientError::Exhausted { status, .. } => Some(*status),
            ClientError::NotAuthenticated => Some(401),
            ClientError::Network(_) | ClientError::InvalidRequest(_) => None,
        }
    }
}
