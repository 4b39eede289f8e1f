//! ERP gateway (v1)
//!
//! Same-origin edge for the ERP frontend, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  GATEWAY                      │
//!   Browser / CLI        │                                               │
//!   ─────────────────────┼─▶ request id ─▶ trace ─▶ timeout ─▶ limits    │
//!                        │        │                                      │
//!                        │        ├─▶ /api/proxy/** ──▶ proxy::forward ──┼──▶ Backend API
//!                        │        ├─▶ /api/media/** ──▶ proxy::media  ───┼──▶ Backend /media/
//!                        │        ├─▶ /api/auth/*   ──▶ auth::handlers ──┼──▶ Backend auth
//!                        │        └─▶ pages ─▶ access_gate ─▶ ServeDir   │
//!                        │                                               │
//!                        │  config · observability · lifecycle           │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use erp_gateway::config::{load_config, load_from_env};
use erp_gateway::lifecycle::{wait_for_signal, Shutdown};
use erp_gateway::observability::{logging, metrics};
use erp_gateway::{GatewayError, GatewayServer};

#[derive(Parser)]
#[command(name = "erp-gateway")]
#[command(about = "Same-origin proxy and session relay for the ERP backend", long_about = None)]
struct Args {
    /// TOML config file; defaults plus environment when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("erp-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        follow_redirects = config.backend.follow_redirects,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(metrics::metrics_address(&config.observability)?);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::new(config)?;
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, signal).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
