//! Single-flight session refresh.
//!
//! # States
//! ```text
//! Idle ──(first caller)──▶ Refreshing { batch, flight }
//! Refreshing ──(flight settles, any outcome)──▶ Idle
//! ```
//!
//! Callers arriving while a flight is running await that same flight, so one
//! burst of 401s costs one upstream refresh. Every waiter sees the same
//! [`RefreshOutcome`].

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::observability::metrics;

/// Performs one upstream refresh call.
pub trait SessionRefresher: Send + Sync + 'static {
    /// Resolve to `true` when a new session was obtained.
    fn refresh(&self) -> BoxFuture<'static, bool>;
}

impl<F> SessionRefresher for F
where
    F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
{
    fn refresh(&self) -> BoxFuture<'static, bool> {
        self()
    }
}

/// Result delivered to every waiter of one flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub refreshed: bool,
    /// Flight number, starting at 1. Waiters of the same flight share it.
    pub batch: u64,
}

type Flight = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Refreshing { batch: u64, flight: Flight },
}

struct Inner {
    state: RefreshState,
    last_batch: u64,
}

/// Process-wide coordinator; share it behind an `Arc`.
pub struct RefreshCoordinator {
    inner: Arc<Mutex<Inner>>,
    refresher: Arc<dyn SessionRefresher>,
}

impl RefreshCoordinator {
    pub fn new(refresher: impl SessionRefresher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: RefreshState::Idle,
                last_batch: 0,
            })),
            refresher: Arc::new(refresher),
        }
    }

    fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
        inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Refresh the session, joining the running flight if there is one.
    pub async fn ensure_fresh_session(&self) -> RefreshOutcome {
        self.join_or_start().await
    }

    /// Whether a flight is currently running.
    pub fn is_refreshing(&self) -> bool {
        matches!(Self::lock(&self.inner).state, RefreshState::Refreshing { .. })
    }

    fn join_or_start(&self) -> Flight {
        let mut inner = Self::lock(&self.inner);

        if let RefreshState::Refreshing { batch, flight } = &inner.state {
            tracing::debug!(batch, "Joining in-flight session refresh");
            return flight.clone();
        }

        inner.last_batch += 1;
        let batch = inner.last_batch;
        let call = self.refresher.refresh();
        let state = Arc::clone(&self.inner);

        let flight = async move {
            tracing::debug!(batch, "Starting session refresh");
            let refreshed = call.await;
            metrics::record_refresh(refreshed);

            let mut inner = Self::lock(&state);
            if matches!(inner.state, RefreshState::Refreshing { batch: current, .. } if current == batch) {
                inner.state = RefreshState::Idle;
            }
            drop(inner);

            if refreshed {
                tracing::info!(batch, "Session refreshed");
            } else {
                tracing::warn!(batch, "Session refresh failed");
            }
            RefreshOutcome { refreshed, batch }
        }
        .boxed()
        .shared();

        inner.state = RefreshState::Refreshing {
            batch,
            flight: flight.clone(),
        };
        // Drive the flight to completion even if every waiter goes away.
        tokio::spawn(flight.clone());
        flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(result: bool, calls: Arc<AtomicUsize>) -> RefreshCoordinator {
        RefreshCoordinator::new(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                result
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = Arc::new(counting(true, calls.clone()));

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.ensure_fresh_session().await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for w in waiters {
            outcomes.push(w.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcomes.iter().all(|o| *o == RefreshOutcome { refreshed: true, batch: 1 }));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_resets_to_idle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = counting(false, calls.clone());

        let first = coordinator.ensure_fresh_session().await;
        assert_eq!(first, RefreshOutcome { refreshed: false, batch: 1 });
        assert!(!coordinator.is_refreshing());

        // A later 401 starts a new flight.
        let second = coordinator.ensure_fresh_session().await;
        assert_eq!(second.batch, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_flight_still_settles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = counting(true, calls.clone());

        // Start a flight and drop the only waiter before it completes.
        let _ = tokio::time::timeout(Duration::from_millis(5), coordinator.ensure_fresh_session()).await;
        assert!(coordinator.is_refreshing());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!coordinator.is_refreshing());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let outcome = coordinator.ensure_fresh_session().await;
        assert_eq!(outcome, RefreshOutcome { refreshed: true, batch: 2 });
    }
}
