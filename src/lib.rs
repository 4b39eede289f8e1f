//! ERP gateway library.
//!
//! Same-origin proxy and session relay in front of the ERP backend API, plus
//! the client-side API library used to talk to it.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod security;
pub mod session;

pub use client::{ApiClient, ClientError};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
