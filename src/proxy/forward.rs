//! Generic reverse proxy handler.
//!
//! Forwards GET/POST/PUT/PATCH/DELETE under the proxy mount to the backend:
//!
//! ```text
//! /api/proxy/cadastro/clientes/?page=2
//!     → strip mount, keep suffix byte for byte
//!     → <base>/cadastro/clientes/?page=2
//!     → Bearer from `access` cookie, body translated
//!     → backend response relayed by content-type
//! ```

use std::time::Instant;

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, State},
    http::{header, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::multipart::{Form, Part};

use crate::auth::cookies::{InboundSession, SessionAccessor, TokenKind};
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::relay;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::target::{strip_mount, target_url};
use crate::proxy::upstream::ProxyError;

/// Inbound headers copied onto the backend request as-is.
const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::ACCEPT, header::ACCEPT_LANGUAGE];

/// How the inbound body is carried to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPlan {
    /// No body is sent.
    Empty,
    /// Re-parsed as form data; the outgoing client picks a new boundary.
    Multipart,
    /// Bytes forwarded verbatim with this content-type.
    Raw { content_type: String },
}

/// Decide the body translation from the method and declared content-type.
pub fn body_plan(method: &Method, declared: Option<&str>) -> BodyPlan {
    if matches!(*method, Method::GET | Method::DELETE | Method::HEAD | Method::OPTIONS) {
        return BodyPlan::Empty;
    }
    match declared {
        Some(ct) if is_multipart(ct) => BodyPlan::Multipart,
        Some(ct) => BodyPlan::Raw {
            content_type: ct.to_string(),
        },
        None => BodyPlan::Raw {
            content_type: "application/json".to_string(),
        },
    }
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..19)
        .map(|head| head.eq_ignore_ascii_case("multipart/form-data"))
        .unwrap_or(false)
}

/// Handler mounted at `<proxy prefix>` and `<proxy prefix>/{*path}`.
pub async fn forward(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request.headers().request_id().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    let Some(suffix) = strip_mount(&path, &state.config.mounts.proxy_prefix) else {
        tracing::warn!(request_id = %request_id, path = %path, "Path outside proxy mount");
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let target = target_url(&state.config.backend.base_url, suffix, query.as_deref());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        target = %target,
        "Proxying request"
    );

    let response = match send(&state, request, &target, &request_id).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Proxy request failed");
            e.into_response()
        }
    };

    metrics::record_request("proxy", method.as_str(), response.status().as_u16(), start);
    response
}

async fn send(
    state: &AppState,
    request: Request<Body>,
    target: &str,
    request_id: &str,
) -> Result<Response, ProxyError> {
    let session = InboundSession::from_headers(request.headers());
    let method = request.method().clone();
    let declared = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut outbound = state
        .api
        .request(method.clone(), target)
        .header(X_REQUEST_ID, request_id);

    for name in FORWARDED_HEADERS {
        if let Some(value) = request.headers().get(&name) {
            outbound = outbound.header(name, value.clone());
        }
    }

    // The cookie wins over any Authorization header the caller sent.
    if let Some(token) = session.token(TokenKind::Access) {
        outbound = outbound.bearer_auth(token);
    } else if let Some(value) = request.headers().get(header::AUTHORIZATION) {
        outbound = outbound.header(header::AUTHORIZATION, value.clone());
    }

    let limit = state.config.security.max_body_size;
    outbound = match body_plan(&method, declared.as_deref()) {
        BodyPlan::Empty => outbound,
        BodyPlan::Multipart => outbound.multipart(rebuild_form(request).await?),
        BodyPlan::Raw { content_type } => {
            let bytes = axum::body::to_bytes(request.into_body(), limit)
                .await
                .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
            outbound.header(header::CONTENT_TYPE, content_type).body(bytes)
        }
    };

    let upstream = outbound.send().await.map_err(ProxyError::upstream)?;
    let status = upstream.status();

    if status.is_redirection() && status != StatusCode::NOT_MODIFIED && !state.config.backend.follow_redirects {
        let location = upstream
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("<none>")
            .to_string();
        tracing::error!(
            request_id = %request_id,
            status = %status,
            location = %location,
            "Backend redirected an API call; the forwarded path likely has the wrong trailing slash"
        );
        return Err(ProxyError::Redirect {
            status: status.as_u16(),
            location,
        });
    }

    tracing::debug!(request_id = %request_id, status = %status, "Backend responded");
    relay(upstream).await
}

/// Re-parse a multipart body into a `reqwest` form, field by field.
async fn rebuild_form(request: Request<Body>) -> Result<Form, ProxyError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ProxyError::BadRequest(e.body_text()))?;

    let mut form = Form::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ProxyError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ProxyError::BadRequest(e.body_text()))?;

        let mut part = Part::bytes(data.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| ProxyError::BadRequest(e.to_string()))?;
        }
        form = form.part(name, part);
    }

    Ok(form)
}
