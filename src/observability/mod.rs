//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and the API client produce:
//!     → logging.rs (structured tracing events, request id in every span)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
