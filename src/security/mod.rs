//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Page navigation:
//!     → access_gate.rs (presence of the `access` cookie)
//!     → allow, or redirect to /login or /dashboard
//! ```
//!
//! # Design Decisions
//! - No token verification and no network call at the gate
//! - Prefetch requests are never redirected
//! - API routes are not gated; the backend answers 401 itself

pub mod access_gate;

pub use access_gate::{access_gate, evaluate, GateDecision, GateState};
