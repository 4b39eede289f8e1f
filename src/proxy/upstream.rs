//! Upstream HTTP clients and failure mapping.
//!
//! # Responsibilities
//! - Build the API and media clients with their redirect policies
//! - Classify network failures (refused, DNS, timeout, other)
//! - Map proxy failures to the `{ error, details }` JSON body

use std::error::Error as StdError;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::{redirect, Client};
use serde::Serialize;

use crate::config::{BackendConfig, TimeoutConfig};
use crate::observability::metrics;

/// Client for API forwarding and auth relay calls.
///
/// Redirects are surfaced to the handler unless `follow_redirects` is set.
pub fn api_client(backend: &BackendConfig, timeouts: &TimeoutConfig) -> reqwest::Result<Client> {
    let policy = if backend.follow_redirects {
        redirect::Policy::limited(10)
    } else {
        redirect::Policy::none()
    };
    builder(timeouts).redirect(policy).build()
}

/// Client for media fetches, which always follows redirects.
pub fn media_client(timeouts: &TimeoutConfig) -> reqwest::Result<Client> {
    builder(timeouts).redirect(redirect::Policy::limited(10)).build()
}

fn builder(timeouts: &TimeoutConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.request_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .no_proxy()
}

/// Kind of network-level failure talking to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    Refused,
    NotFound,
    Timeout,
    Other,
}

impl UpstreamFailure {
    /// Classify a `reqwest` error by walking its source chain.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return UpstreamFailure::Timeout;
        }

        let mut source: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionRefused => return UpstreamFailure::Refused,
                    std::io::ErrorKind::TimedOut => return UpstreamFailure::Timeout,
                    _ => {}
                }
            }
            let text = cause.to_string().to_ascii_lowercase();
            if text.contains("dns error")
                || text.contains("failed to lookup address")
                || text.contains("name or service not known")
                || text.contains("no such host")
            {
                return UpstreamFailure::NotFound;
            }
            if text.contains("connection refused") {
                return UpstreamFailure::Refused;
            }
            source = cause.source();
        }

        UpstreamFailure::Other
    }

    /// Human-readable classification used as the `error` field.
    pub fn message(&self) -> &'static str {
        match self {
            UpstreamFailure::Refused => "Backend connection refused",
            UpstreamFailure::NotFound => "Backend host not found",
            UpstreamFailure::Timeout => "Backend request timed out",
            UpstreamFailure::Other => "Backend request failed",
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamFailure::Refused => "refused",
            UpstreamFailure::NotFound => "dns",
            UpstreamFailure::Timeout => "timeout",
            UpstreamFailure::Other => "other",
        }
    }
}

/// Error body returned by the proxy and auth handlers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Failures produced by the gateway itself, not relayed from the backend.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{}: {details}", .failure.message())]
    Upstream {
        failure: UpstreamFailure,
        details: String,
    },

    #[error("backend answered {status} redirect to {location}")]
    Redirect { status: u16, location: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("failed to read backend response: {0}")]
    Body(String),
}

impl ProxyError {
    /// Wrap a `reqwest` send error, recording its classification.
    pub fn upstream(err: reqwest::Error) -> Self {
        let failure = UpstreamFailure::classify(&err);
        metrics::record_upstream_failure(failure.label());
        ProxyError::Upstream {
            failure,
            details: err.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ProxyError::Upstream { failure, details } => ErrorBody {
                error: failure.message().to_string(),
                details: Some(details.clone()),
            },
            ProxyError::Redirect { status, location } => ErrorBody {
                error: "Backend redirect rejected".to_string(),
                details: Some(format!(
                    "backend answered {} with Location '{}'; check the trailing slash of the requested path",
                    status, location
                )),
            },
            ProxyError::BadRequest(details) => ErrorBody {
                error: "Invalid request body".to_string(),
                details: Some(details.clone()),
            },
            ProxyError::Body(details) => ErrorBody {
                error: "Backend response could not be read".to_string(),
                details: Some(details.clone()),
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
