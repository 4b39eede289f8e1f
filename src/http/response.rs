//! Backend response translation.
//!
//! # Responsibilities
//! - Classify the backend `content-type`
//! - Re-emit JSON, binary and text bodies with the backend status
//! - Attach the one-day cache directive to binary payloads

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::proxy::upstream::ProxyError;

/// Cache directive for images and other binary payloads.
pub const BINARY_CACHE_CONTROL: &str = "public, max-age=86400";

/// How a backend body is relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Binary,
    Text,
}

impl ContentKind {
    /// Classify a `content-type` value; absent means text.
    pub fn of(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return ContentKind::Text;
        };
        let mime = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            ContentKind::Json
        } else if mime.starts_with("image/") || mime == "application/octet-stream" {
            ContentKind::Binary
        } else {
            ContentKind::Text
        }
    }
}

/// Translate a backend response into the gateway response.
pub async fn relay(upstream: reqwest::Response) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let kind = ContentKind::of(content_type.as_deref());

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ProxyError::Body(e.to_string()))?;

    let response = match kind {
        ContentKind::Json if bytes.is_empty() => status.into_response(),
        ContentKind::Json => match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => (status, axum::Json(value)).into_response(),
            Err(e) => {
                // Declared JSON that does not parse is relayed untouched.
                tracing::warn!(status = %status, error = %e, "Backend sent malformed JSON");
                raw(status, content_type.as_deref(), bytes)
            }
        },
        ContentKind::Binary => {
            let mut response = raw(status, content_type.as_deref(), bytes);
            response.headers_mut().insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static(BINARY_CACHE_CONTROL),
            );
            response
        }
        ContentKind::Text => raw(status, content_type.as_deref(), bytes),
    };

    Ok(response)
}

/// Body with the backend content-type, `text/plain` when absent.
pub fn raw(status: StatusCode, content_type: Option<&str>, bytes: Bytes) -> Response {
    let content_type = content_type
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("text/plain; charset=utf-8"));

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind() {
        assert_eq!(ContentKind::of(Some("application/json")), ContentKind::Json);
        assert_eq!(ContentKind::of(Some("application/json; charset=utf-8")), ContentKind::Json);
        assert_eq!(ContentKind::of(Some("application/problem+json")), ContentKind::Json);
        assert_eq!(ContentKind::of(Some("image/png")), ContentKind::Binary);
        assert_eq!(ContentKind::of(Some("Image/SVG+XML")), ContentKind::Binary);
        assert_eq!(ContentKind::of(Some("application/octet-stream")), ContentKind::Binary);
        assert_eq!(ContentKind::of(Some("text/html")), ContentKind::Text);
        assert_eq!(ContentKind::of(Some("application/pdf")), ContentKind::Text);
        assert_eq!(ContentKind::of(None), ContentKind::Text);
    }

    #[test]
    fn test_raw_defaults_to_text_plain() {
        let response = raw(StatusCode::ACCEPTED, None, "ok".into());
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
