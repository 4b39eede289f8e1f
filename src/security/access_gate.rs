//! Page access gate.
//!
//! Runs before any page is served and looks only at whether an `access`
//! cookie is present. The token is not verified here; the backend checks it
//! on every API call.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::auth::cookies::{clear_session, InboundSession, SessionAccessor, TokenKind};
use crate::config::{AuthConfig, GateConfig};

/// Outcome of the gate for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { to: String, clear_cookies: bool },
}

/// State of the gate middleware.
#[derive(Debug, Clone)]
pub struct GateState {
    pub gate: GateConfig,
    pub auth: AuthConfig,
}

/// Whether the request is a speculative prefetch.
pub fn is_prefetch(headers: &HeaderMap, config: &GateConfig) -> bool {
    if config.prefetch_headers.iter().any(|name| headers.contains_key(name.as_str())) {
        return true;
    }
    ["purpose", "sec-purpose"].iter().any(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("prefetch"))
            .unwrap_or(false)
    })
}

fn is_protected(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .map(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(false)
}

/// Decide what to do with a navigation.
pub fn evaluate(path: &str, has_access: bool, prefetch: bool, config: &GateConfig) -> GateDecision {
    if prefetch {
        return GateDecision::Allow;
    }

    if has_access && (path == config.login_path || path == "/") {
        return GateDecision::Redirect {
            to: config.home_path.clone(),
            clear_cookies: false,
        };
    }

    if !has_access && is_protected(path, &config.protected_prefix) {
        return GateDecision::Redirect {
            to: config.login_path.clone(),
            clear_cookies: true,
        };
    }

    GateDecision::Allow
}

/// Middleware applying [`evaluate`] to page requests.
pub async fn access_gate(
    State(state): State<Arc<GateState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let has_access = InboundSession::from_jar(jar.clone()).has(TokenKind::Access);
    let prefetch = is_prefetch(request.headers(), &state.gate);

    match evaluate(&path, has_access, prefetch, &state.gate) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect { to, clear_cookies } => {
            tracing::debug!(path = %path, to = %to, has_access, "Gate redirect");
            if clear_cookies {
                (clear_session(jar, &state.auth), Redirect::temporary(&to)).into_response()
            } else {
                Redirect::temporary(&to).into_response()
            }
        }
    }
}
