//! Client-side session upkeep.
//!
//! # Data Flow
//! ```text
//! API call → 401
//!     → refresh.rs (join or start the single refresh flight)
//!     → refreshed: caller retries its request once
//!     → failed:    redirect.rs (one login redirect per flight)
//! ```
//!
//! # Design Decisions
//! - The state lock is never held across an await
//! - A flight settles even if every waiter is dropped

pub mod redirect;
pub mod refresh;

pub use redirect::{LogNavigator, LoginRedirect, Navigator};
pub use refresh::{RefreshCoordinator, RefreshOutcome, SessionRefresher};
