//! Media proxy handler.
//!
//! Serves binary assets (QR codes, photos) that live under the backend's media
//! root rather than its API root. Callers expect bytes or nothing, so every
//! failure is an empty body.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::{raw, BINARY_CACHE_CONTROL};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::target::{media_url, strip_mount};
use crate::proxy::upstream::UpstreamFailure;

/// GET handler mounted at `<media prefix>/{*path}`.
pub async fn media(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.headers().request_id().to_string();
    let path = request.uri().path();

    let Some(suffix) = strip_mount(path, &state.config.mounts.media_prefix) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let target = media_url(
        &state.config.backend.base_url,
        &state.config.backend.media_root,
        suffix,
        request.uri().query(),
    );

    tracing::debug!(request_id = %request_id, target = %target, "Fetching media");

    let response = fetch(&state, &target, &request_id).await;
    metrics::record_request("media", "GET", response.status().as_u16(), start);
    response
}

async fn fetch(state: &AppState, target: &str, request_id: &str) -> Response {
    let upstream = match state.media.get(target).header(X_REQUEST_ID, request_id).send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            let failure = UpstreamFailure::classify(&e);
            metrics::record_upstream_failure(failure.label());
            tracing::error!(request_id = %request_id, target = %target, error = %e, "{}", failure.message());
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        tracing::warn!(request_id = %request_id, target = %target, status = %status, "Media not available");
        return status.into_response();
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    match upstream.bytes().await {
        Ok(bytes) => {
            let mut response = raw(status, Some(&content_type), bytes);
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static(BINARY_CACHE_CONTROL));
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Media body read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
