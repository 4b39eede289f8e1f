//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! API client request:
//!     → retries.rs (classify attempt, retry transient statuses)
//!     → backoff.rs (fixed or exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Retries live only in the API client; the proxy never retries
//! - Outcomes are tagged values, not errors used for control flow

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{with_retry, Attempt, RetryOutcome, RetryPolicy};
