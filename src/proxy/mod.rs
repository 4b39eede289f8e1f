//! Backend proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request under a mount point
//!     → target.rs (mount stripped, suffix kept byte for byte)
//!     → forward.rs (API verbs) or media.rs (GET assets)
//!     → upstream.rs (reqwest clients, failure classification)
//!     → http::response (relay by content-type)
//! ```
//!
//! # Design Decisions
//! - API calls do not follow redirects; a 3xx is reported as an error
//! - Media fetches follow redirects
//! - No retries here; the API client owns that policy

pub mod forward;
pub mod media;
pub mod target;
pub mod upstream;

pub use upstream::{ProxyError, UpstreamFailure};
