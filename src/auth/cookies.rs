//! Session cookie access.
//!
//! Handlers read tokens through [`SessionAccessor`] and never care whether
//! they come from the browser's `Cookie` header ([`InboundSession`]) or from
//! the backend's `Set-Cookie` headers ([`UpstreamSession`]). Writes go through
//! [`issue_session`] and [`clear_session`] on an axum-extra [`CookieJar`].

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use serde_json::Value;

use crate::config::AuthConfig;

/// The two session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    pub fn cookie_name(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Read access to session tokens.
pub trait SessionAccessor {
    /// Token value, `None` when absent or empty.
    fn token(&self, kind: TokenKind) -> Option<String>;

    fn has(&self, kind: TokenKind) -> bool {
        self.token(kind).is_some()
    }
}

/// Tokens the browser sent with the inbound request.
#[derive(Debug, Clone)]
pub struct InboundSession {
    jar: CookieJar,
}

impl InboundSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            jar: CookieJar::from_headers(headers),
        }
    }

    pub fn from_jar(jar: CookieJar) -> Self {
        Self { jar }
    }
}

impl SessionAccessor for InboundSession {
    fn token(&self, kind: TokenKind) -> Option<String> {
        self.jar
            .get(kind.cookie_name())
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Tokens the backend issued through `Set-Cookie` response headers.
#[derive(Debug, Clone, Default)]
pub struct UpstreamSession {
    cookies: HashMap<String, Cookie<'static>>,
}

impl UpstreamSession {
    /// Parse every `Set-Cookie` header. Unparseable headers are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(text) = value.to_str() else {
                continue;
            };
            match Cookie::parse(text.to_string()) {
                Ok(cookie) => {
                    cookies.insert(cookie.name().to_string(), cookie.into_owned());
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring malformed Set-Cookie header"),
            }
        }
        Self { cookies }
    }
}

impl SessionAccessor for UpstreamSession {
    fn token(&self, kind: TokenKind) -> Option<String> {
        self.cookies
            .get(kind.cookie_name())
            .filter(|c| !is_removal(c))
            .map(|c| c.value().to_string())
    }
}

/// Empty value or `Max-Age=0` marks a deletion, not a token.
fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() || cookie.max_age().map(|age| age.is_zero()).unwrap_or(false)
}

/// An access/refresh pair, either half possibly missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionTokens {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl SessionTokens {
    pub fn from_accessor(accessor: &impl SessionAccessor) -> Self {
        Self {
            access: accessor.token(TokenKind::Access),
            refresh: accessor.token(TokenKind::Refresh),
        }
    }

    /// Fill missing halves from `access` / `refresh` string fields of a JSON body.
    ///
    /// Nested `tokens` objects are looked at too.
    pub fn or_from_json(mut self, body: &Value) -> Self {
        let field = |name: &str| {
            body.get(name)
                .or_else(|| body.get("tokens").and_then(|t| t.get(name)))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if self.access.is_none() {
            self.access = field("access");
        }
        if self.refresh.is_none() {
            self.refresh = field("refresh");
        }
        self
    }

    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Access => self.access.as_deref(),
            TokenKind::Refresh => self.refresh.as_deref(),
        }
    }
}

fn session_cookie(kind: TokenKind, value: String, max_age_secs: i64, config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((kind.cookie_name(), value))
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Set HTTP-only cookies for every token present.
pub fn issue_session(mut jar: CookieJar, tokens: &SessionTokens, config: &AuthConfig) -> CookieJar {
    if let Some(access) = &tokens.access {
        jar = jar.add(session_cookie(
            TokenKind::Access,
            access.clone(),
            config.access_max_age_secs,
            config,
        ));
    }
    if let Some(refresh) = &tokens.refresh {
        jar = jar.add(session_cookie(
            TokenKind::Refresh,
            refresh.clone(),
            config.refresh_max_age_secs,
            config,
        ));
    }
    jar
}

/// Expire both session cookies, whether or not the browser sent them.
pub fn clear_session(mut jar: CookieJar, config: &AuthConfig) -> CookieJar {
    for kind in TokenKind::ALL {
        jar = jar.add(session_cookie(kind, String::new(), 0, config));
    }
    jar
}
