//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy, media, auth and page handlers
//! - Wire up middleware (tracing, limits, timeouts, request ID)
//! - Put the access gate in front of page routes only
//! - Bind server to listener and drain on shutdown

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::auth::{auth_routes, ModulePolicy};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::proxy::{forward::forward, media::media, upstream};
use crate::security::{access_gate, GateState};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Backend API client; redirects follow `backend.follow_redirects`.
    pub api: reqwest::Client,
    /// Media client; always follows redirects.
    pub media: reqwest::Client,
    pub modules: Arc<ModulePolicy>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let api = upstream::api_client(&config.backend, &config.timeouts)?;
        let media = upstream::media_client(&config.timeouts)?;
        let modules = Arc::new(ModulePolicy::from_config(&config.permissions));
        Ok(Self {
            config: Arc::new(config),
            api,
            media,
            modules,
        })
    }
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let state = AppState::new(config)?;
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mounts = &config.mounts;
        let proxy = || get(forward).post(forward).put(forward).patch(forward).delete(forward);

        let api = Router::new()
            .route(&mounts.proxy_prefix, proxy())
            .route(&format!("{}/", mounts.proxy_prefix), proxy())
            .route(&format!("{}/{{*path}}", mounts.proxy_prefix), proxy())
            .route(&format!("{}/{{*path}}", mounts.media_prefix), get(media))
            .merge(auth_routes(&mounts.auth_prefix))
            .route("/healthz", get(healthz))
            .with_state(state);

        let gate = Arc::new(GateState {
            gate: config.gate.clone(),
            auth: config.auth.clone(),
        });
        let pages = Router::new()
            .fallback_service(ServeDir::new(&config.gate.pages_root))
            .layer(middleware::from_fn_with_state(gate, access_gate));

        let max_body = config.security.max_body_size;
        api.merge(pages)
            .layer(DefaultBodyLimit::max(max_body))
            .layer(RequestBodyLimitLayer::new(max_body))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.server_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for serving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.base_url,
            proxy_prefix = %self.config.mounts.proxy_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
