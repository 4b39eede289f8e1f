//! Login redirect, at most once per failed refresh flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sends the user to the login page.
pub trait Navigator: Send + Sync + 'static {
    fn to_login(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn to_login(&self) {
        self()
    }
}

/// Logs the redirect; used by headless callers such as the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn to_login(&self) {
        tracing::warn!("Session expired, login required");
    }
}

/// Deduplicates redirects by flight number.
pub struct LoginRedirect {
    navigator: Arc<dyn Navigator>,
    last_batch: AtomicU64,
}

impl LoginRedirect {
    pub fn new(navigator: impl Navigator) -> Self {
        Self {
            navigator: Arc::new(navigator),
            last_batch: AtomicU64::new(0),
        }
    }

    /// Redirect unless this batch (or a newer one) already did.
    ///
    /// Returns whether the navigator was called.
    pub fn redirect_once(&self, batch: u64) -> bool {
        let previous = self.last_batch.fetch_max(batch, Ordering::AcqRel);
        if previous >= batch {
            return false;
        }
        self.navigator.to_login();
        true
    }
}
