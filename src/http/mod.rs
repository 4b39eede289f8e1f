//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign and echo x-request-id)
//!     → server.rs (router: proxy, media, auth, gated pages)
//!     → handlers in proxy/ and auth/
//!     → response.rs (relay by content type)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
