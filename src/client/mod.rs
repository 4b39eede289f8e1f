//! Client-side API library.
//!
//! The single entry point for code that talks to the gateway: the CLI and
//! any Rust UI. Owns retry on backend cold starts and refresh on 401.

pub mod api;
pub mod error;
pub mod request;

pub use api::{ApiClient, GatewayRefresher};
pub use error::ClientError;
pub use request::{ApiRequest, FormField, FormValue, RequestBody};
