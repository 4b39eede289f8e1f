//! Gateway API client.
//!
//! # Request flow
//! ```text
//! ApiRequest
//!     → send (retry on cold-start statuses, fixed delay)
//!     → 3xx                 → ClientError::Redirect
//!     → 401 + auth_required → RefreshCoordinator
//!         refreshed → send once more (second 401 is terminal)
//!         failed    → LoginRedirect::redirect_once + NotAuthenticated
//!     → other non-2xx       → ClientError::Status
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::{header, redirect, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::request::{ApiRequest, FormField, RequestBody};
use super::ClientError;
use crate::config::{ClientConfig, MountConfig};
use crate::http::response::ContentKind;
use crate::resilience::{with_retry, Attempt, Backoff, RetryOutcome, RetryPolicy};
use crate::session::{LogNavigator, LoginRedirect, Navigator, RefreshCoordinator, SessionRefresher};

/// Refreshes the session through the gateway's own refresh route.
///
/// Shares the client's cookie store, so the new `access` cookie is picked up
/// by every later call.
pub struct GatewayRefresher {
    http: reqwest::Client,
    url: String,
}

impl SessionRefresher for GatewayRefresher {
    fn refresh(&self) -> BoxFuture<'static, bool> {
        let http = self.http.clone();
        let url = self.url.clone();
        async move {
            match http.post(&url).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Refresh call failed");
                    false
                }
            }
        }
        .boxed()
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    gateway: String,
    mounts: MountConfig,
    retry: RetryPolicy,
    retry_statuses: Vec<u16>,
    coordinator: Arc<RefreshCoordinator>,
    redirect: Arc<LoginRedirect>,
}

impl ApiClient {
    /// Client for a gateway at `gateway` (e.g. `http://localhost:3000`).
    pub fn new(gateway: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()?;

        let gateway = gateway.trim_end_matches('/').to_string();
        let mounts = MountConfig::default();
        let refresher = GatewayRefresher {
            http: http.clone(),
            url: format!("{}{}/refresh", gateway, mounts.auth_prefix),
        };

        Ok(Self {
            http,
            gateway,
            mounts,
            retry: RetryPolicy::new(config.max_attempts, Backoff::from_config(config)),
            retry_statuses: config.retry_statuses.clone(),
            coordinator: Arc::new(RefreshCoordinator::new(refresher)),
            redirect: Arc::new(LoginRedirect::new(LogNavigator)),
        })
    }

    /// Use non-default mount points.
    pub fn with_mounts(mut self, mounts: MountConfig) -> Self {
        self.mounts = mounts;
        self.coordinator = Arc::new(RefreshCoordinator::new(self.gateway_refresher()));
        self
    }

    pub fn with_navigator(mut self, navigator: impl Navigator) -> Self {
        self.redirect = Arc::new(LoginRedirect::new(navigator));
        self
    }

    pub fn with_refresher(mut self, refresher: impl SessionRefresher) -> Self {
        self.coordinator = Arc::new(RefreshCoordinator::new(refresher));
        self
    }

    fn gateway_refresher(&self) -> GatewayRefresher {
        GatewayRefresher {
            http: self.http.clone(),
            url: format!("{}{}", self.gateway, self.refresh_path()),
        }
    }

    fn refresh_path(&self) -> String {
        format!("{}/refresh", self.mounts.auth_prefix)
    }

    fn auth_path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.mounts.auth_prefix, endpoint)
    }

    /// Gateway path for a backend path, e.g. `/cadastro/clientes/`.
    pub fn proxy_path(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.mounts.proxy_prefix, path)
        } else {
            format!("{}/{}", self.mounts.proxy_prefix, path)
        }
    }

    /// Run a request; JSON responses are parsed, anything else yields `None`.
    pub async fn send(&self, request: &ApiRequest) -> Result<Option<Value>, ClientError> {
        let response = self.execute(request).await?;
        let is_json = ContentKind::of(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        ) == ContentKind::Json;

        if !is_json {
            return Ok(None);
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ClientError::InvalidRequest(format!("Malformed JSON response: {}", e)))
    }

    /// Run a request and return the raw body.
    pub async fn fetch_bytes(&self, request: &ApiRequest) -> Result<Bytes, ClientError> {
        Ok(self.execute(request).await?.bytes().await?)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let response = self.send_with_retry(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || !request.auth_required
            || request.path == self.refresh_path()
        {
            return Self::check(response).await;
        }

        tracing::debug!(path = %request.path, "Unauthorized, refreshing session");
        let outcome = self.coordinator.ensure_fresh_session().await;
        if !outcome.refreshed {
            self.redirect.redirect_once(outcome.batch);
            return Err(ClientError::NotAuthenticated);
        }

        let retried = self.send_with_retry(request).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Still unauthorized after refresh");
            self.redirect.redirect_once(outcome.batch);
            return Err(ClientError::NotAuthenticated);
        }
        Self::check(retried).await
    }

    async fn send_with_retry(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let outcome = with_retry(&self.retry, |attempt| async move {
            match self.send_once(request).await {
                Ok(response) if self.retry_statuses.contains(&response.status().as_u16()) => {
                    tracing::info!(
                        path = %request.path,
                        status = %response.status(),
                        attempt,
                        "Backend unavailable"
                    );
                    Attempt::Retry(ClientError::Exhausted {
                        status: response.status().as_u16(),
                        attempts: attempt,
                    })
                }
                Ok(response) => Attempt::Done(response),
                Err(e) => Attempt::Fail(e),
            }
        })
        .await;

        match outcome {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted { last, .. } => Err(last),
            RetryOutcome::Failed { error, .. } => Err(error),
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.gateway, request.path);
        let mut outbound = self
            .http
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");

        outbound = match &request.body {
            RequestBody::Empty => outbound,
            RequestBody::Json(value) => outbound.json(value),
            RequestBody::Form(fields) => outbound.multipart(RequestBody::form(fields)?),
        };

        let response = outbound.send().await?;
        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            tracing::error!(
                path = %request.path,
                status = %status,
                location = location.as_deref().unwrap_or("<none>"),
                "Unexpected redirect, check the trailing slash"
            );
            return Err(ClientError::Redirect {
                status: status.as_u16(),
                location,
            });
        }
        Ok(response)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.send(&ApiRequest::new(Method::GET, self.proxy_path(path))).await
    }

    pub async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::POST, self.proxy_path(path)).body(RequestBody::json(body)?);
        self.send(&request).await
    }

    pub async fn put_json(&self, path: &str, body: &impl Serialize) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::PUT, self.proxy_path(path)).body(RequestBody::json(body)?);
        self.send(&request).await
    }

    pub async fn patch_json(&self, path: &str, body: &impl Serialize) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::PATCH, self.proxy_path(path)).body(RequestBody::json(body)?);
        self.send(&request).await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.send(&ApiRequest::new(Method::DELETE, self.proxy_path(path))).await
    }

    pub async fn post_form(&self, path: &str, fields: Vec<FormField>) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::POST, self.proxy_path(path)).body(RequestBody::Form(fields));
        self.send(&request).await
    }

    /// Log in; the gateway sets the session cookies in this client's store.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value, ClientError> {
        let body = RequestBody::json(&serde_json::json!({ "username": username, "password": password }))?;
        let request = ApiRequest::new(Method::POST, self.auth_path("login")).body(body).public();
        Ok(self.send(&request).await?.unwrap_or(Value::Null))
    }

    /// Current user, or `None` when there is no valid session.
    pub async fn me(&self) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::GET, self.auth_path("me")).public();
        match self.send(&request).await {
            Err(ClientError::Status { status: 401, .. }) => Ok(None),
            other => other,
        }
    }

    pub async fn modules(&self) -> Result<Option<Value>, ClientError> {
        let request = ApiRequest::new(Method::GET, self.auth_path("modules")).public();
        self.send(&request).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = ApiRequest::new(Method::POST, self.auth_path("logout")).public();
        self.send(&request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_path_joins_prefix() {
        let client = ApiClient::new("http://localhost:3000/", &ClientConfig::default()).unwrap();
        assert_eq!(client.proxy_path("/cadastro/clientes/"), "/api/proxy/cadastro/clientes/");
        assert_eq!(client.proxy_path("financeiro/contas"), "/api/proxy/financeiro/contas");
        assert_eq!(client.refresh_path(), "/api/auth/refresh");
        assert_eq!(client.gateway, "http://localhost:3000");
    }

    #[test]
    fn test_error_status() {
        assert_eq!(ClientError::NotAuthenticated.status(), Some(401));
        assert_eq!(ClientError::Exhausted { status: 503, attempts: 3 }.status(), Some(503));
        assert_eq!(ClientError::InvalidRequest("x".into()).status(), None);
    }
}
