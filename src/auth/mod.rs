//! Session authentication relay.
//!
//! # Data Flow
//! ```text
//! Browser → /api/auth/login  → backend login   → Set-Cookie/JSON tokens → own HTTP-only cookies
//! Browser → /api/auth/me     → backend me      (cookie header forwarded verbatim)
//! Browser → /api/auth/refresh→ backend refresh → new access cookie
//! Browser → /api/auth/logout → backend logout  (best effort) → cookies cleared
//! ```

pub mod cookies;
pub mod handlers;
pub mod permissions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use self::handlers::*;

pub use cookies::{InboundSession, SessionAccessor, SessionTokens, TokenKind, UpstreamSession};
pub use permissions::ModulePolicy;

/// Auth routes under `prefix` (e.g. `/api/auth`).
pub fn auth_routes(prefix: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("{}/login", prefix), post(login))
        .route(&format!("{}/me", prefix), get(me))
        .route(&format!("{}/modules", prefix), get(modules))
        .route(&format!("{}/logout", prefix), post(logout))
        .route(&format!("{}/refresh", prefix), post(refresh))
}
