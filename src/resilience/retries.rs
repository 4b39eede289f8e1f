//! Bounded retry of an async operation.
//!
//! The operation classifies each attempt itself: [`Attempt::Retry`] for a
//! transient failure, [`Attempt::Fail`] for a terminal one. [`with_retry`]
//! turns that into a tagged [`RetryOutcome`] instead of an error path.

use std::future::Future;

use crate::resilience::backoff::Backoff;

/// Attempt count and delay schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Backoff::Fixed(std::time::Duration::ZERO))
    }
}

/// Result of one attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Done(T),
    Retry(E),
    Fail(E),
}

/// Final result of [`with_retry`].
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// An attempt produced a value.
    Success { value: T, attempts: u32 },
    /// Every attempt was transient; `last` is the final failure.
    Exhausted { last: E, attempts: u32 },
    /// An attempt failed terminally.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Run `operation` until it is done, fails terminally, or the policy is spent.
///
/// `operation` receives the 1-based attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);

    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Attempt::Done(value) => return RetryOutcome::Success { value, attempts: attempt },
            Attempt::Fail(error) => return RetryOutcome::Failed { error, attempts: attempt },
            Attempt::Retry(last) if attempt >= max_attempts => {
                return RetryOutcome::Exhausted { last, attempts: attempt };
            }
            Attempt::Retry(_) => {
                let delay = policy.backoff.delay(attempt);
                tracing::debug!(attempt, delay = ?delay, "Transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
