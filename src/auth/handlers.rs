//! Auth relay handlers.
//!
//! These call the backend auth endpoints directly rather than through the
//! generic proxy, so tokens can be moved between backend `Set-Cookie`
//! headers, JSON bodies and this gateway's own HTTP-only cookies.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::auth::cookies::{
    clear_session, issue_session, InboundSession, SessionAccessor, SessionTokens, TokenKind,
    UpstreamSession,
};
use crate::http::request::{RequestIdExt, X_REQUEST_ID};
use crate::http::response::relay;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::target::target_url;
use crate::proxy::upstream::ProxyError;

const NOT_AUTHENTICATED: &str = "Not authenticated";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn backend_url(state: &AppState, path: &str) -> String {
    target_url(&state.config.backend.base_url, path, None)
}

fn not_authenticated() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": NOT_AUTHENTICATED })))
}

/// Error message from a backend error body.
///
/// Django REST style bodies carry it in `detail`, `error`, `message` or the
/// first entry of `non_field_errors`.
pub fn error_detail(body: &Value) -> Option<String> {
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| {
            body.get("non_field_errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(credentials): Json<LoginRequest>,
) -> Response {
    let request_id = headers.request_id();
    let url = backend_url(&state, &state.config.auth.login_path);

    let upstream = match state
        .api
        .post(&url)
        .header(X_REQUEST_ID, request_id)
        .json(&credentials)
        .send()
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Backend login unreachable");
            return ProxyError::upstream(e).into_response();
        }
    };

    let status = upstream.status();
    let received = UpstreamSession::from_headers(upstream.headers());
    let body: Value = upstream.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let detail = error_detail(&body).unwrap_or_else(|| "Invalid credentials".to_string());
        tracing::warn!(
            request_id = %request_id,
            username = %credentials.username,
            status = %status,
            "Login rejected by backend"
        );
        return (status, Json(json!({ "error": detail }))).into_response();
    }

    let tokens = SessionTokens::from_accessor(&received).or_from_json(&body);
    if tokens.access.is_none() {
        tracing::warn!(request_id = %request_id, "Backend login succeeded without an access token");
    }

    let mut payload = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    for kind in TokenKind::ALL {
        if let Some(token) = tokens.get(kind) {
            payload.insert(kind.cookie_name().to_string(), Value::String(token.to_string()));
        }
    }

    tracing::info!(request_id = %request_id, username = %credentials.username, "Login successful");
    let jar = issue_session(jar, &tokens, &state.config.auth);
    (jar, Json(Value::Object(payload))).into_response()
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match fetch_me(&state, &headers).await {
        Ok(Some(upstream)) => relay(upstream).await.unwrap_or_else(IntoResponse::into_response),
        Ok(None) => not_authenticated().into_response(),
        Err(e) => e.into_response(),
    }
}

/// Backend identity call with the caller's cookies; `None` when not authenticated.
async fn fetch_me(state: &AppState, headers: &HeaderMap) -> Result<Option<reqwest::Response>, ProxyError> {
    let request_id = headers.request_id();
    let url = backend_url(state, &state.config.auth.me_path);

    let mut outbound = state.api.get(&url).header(X_REQUEST_ID, request_id);
    if let Some(cookie) = headers.get(header::COOKIE) {
        outbound = outbound.header(header::COOKIE, cookie.clone());
    }

    let upstream = outbound.send().await.map_err(|e| {
        tracing::error!(request_id = %request_id, error = %e, "Backend identity check unreachable");
        ProxyError::upstream(e)
    })?;

    if upstream.status().is_success() {
        Ok(Some(upstream))
    } else {
        tracing::debug!(request_id = %request_id, status = %upstream.status(), "Identity check rejected");
        Ok(None)
    }
}

/// `GET /api/auth/modules`: modules the current user may open.
pub async fn modules(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let upstream = match fetch_me(&state, &headers).await {
        Ok(Some(upstream)) => upstream,
        Ok(None) => return not_authenticated().into_response(),
        Err(e) => return e.into_response(),
    };

    let user: Value = match upstream.json().await {
        Ok(user) => user,
        Err(e) => return ProxyError::Body(e.to_string()).into_response(),
    };

    Json(json!({
        "role": crate::auth::permissions::ModulePolicy::role_of(&user),
        "modules": state.modules.modules_for(&user),
    }))
    .into_response()
}

/// `POST /api/auth/logout`
///
/// The backend call is best effort; local cookies are always cleared.
pub async fn logout(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    let request_id = headers.request_id();
    let session = InboundSession::from_jar(jar.clone());
    let url = backend_url(&state, &state.config.auth.logout_path);

    let mut outbound = state.api.post(&url).header(X_REQUEST_ID, request_id);
    if let Some(cookie) = headers.get(header::COOKIE) {
        outbound = outbound.header(header::COOKIE, cookie.clone());
    }
    if let Some(access) = session.token(TokenKind::Access) {
        outbound = outbound.bearer_auth(access);
    }
    outbound = match session.token(TokenKind::Refresh) {
        Some(refresh) => outbound.json(&json!({ "refresh": refresh })),
        None => outbound.json(&json!({})),
    };

    match outbound.send().await {
        Ok(upstream) if upstream.status().is_success() => {
            tracing::info!(request_id = %request_id, "Backend session invalidated");
        }
        Ok(upstream) => {
            tracing::warn!(
                request_id = %request_id,
                status = %upstream.status(),
                "Backend logout rejected, clearing local session anyway"
            );
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                "Backend logout unreachable, clearing local session anyway"
            );
        }
    }

    let jar = clear_session(jar, &state.config.auth);
    (jar, Json(json!({ "success": true }))).into_response()
}

/// `POST /api/auth/refresh`
///
/// Exchanges the `refresh` cookie for a new `access` cookie. Any failure
/// clears the session so the caller falls back to the login page.
pub async fn refresh(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    let request_id = headers.request_id();
    let session = InboundSession::from_jar(jar.clone());

    let Some(refresh_token) = session.token(TokenKind::Refresh) else {
        tracing::debug!(request_id = %request_id, "Refresh requested without a refresh cookie");
        metrics::record_refresh(false);
        let (status, body) = not_authenticated();
        return (status, clear_session(jar, &state.config.auth), body).into_response();
    };

    let url = backend_url(&state, &state.config.auth.refresh_path);
    let mut outbound = state
        .api
        .post(&url)
        .header(X_REQUEST_ID, request_id)
        .json(&json!({ "refresh": refresh_token }));
    if let Some(cookie) = headers.get(header::COOKIE) {
        outbound = outbound.header(header::COOKIE, cookie.clone());
    }

    let upstream = match outbound.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Backend refresh unreachable");
            metrics::record_refresh(false);
            return ProxyError::upstream(e).into_response();
        }
    };

    let status = upstream.status();
    let received = UpstreamSession::from_headers(upstream.headers());
    let body: Value = upstream.json().await.unwrap_or(Value::Null);
    let tokens = SessionTokens::from_accessor(&received).or_from_json(&body);

    if !status.is_success() || tokens.access.is_none() {
        tracing::info!(request_id = %request_id, status = %status, "Session refresh failed");
        metrics::record_refresh(false);
        let (status, body) = not_authenticated();
        return (status, clear_session(jar, &state.config.auth), body).into_response();
    }

    tracing::debug!(
        request_id = %request_id,
        rotated = tokens.refresh.is_some(),
        "Session refreshed"
    );
    metrics::record_refresh(true);
    let jar = issue_session(jar, &tokens, &state.config.auth);
    (jar, Json(json!({ "success": true }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_variants() {
        assert_eq!(
            error_detail(&json!({ "detail": "No active account found" })).as_deref(),
            Some("No active account found")
        );
        assert_eq!(
            error_detail(&json!({ "non_field_errors": ["Unable to log in"] })).as_deref(),
            Some("Unable to log in")
        );
        assert_eq!(error_detail(&json!({ "error": "locked" })).as_deref(), Some("locked"));
        assert_eq!(error_detail(&json!({ "username": ["required"] })), None);
        assert_eq!(error_detail(&Value::Null), None);
    }
}
