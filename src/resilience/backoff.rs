//! Delay schedules between attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::{BackoffKind, ClientConfig};

/// How long to wait before the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Doubling delay from `base_ms`, capped at `max_ms`, with up to 10% jitter.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Backoff {
    /// Schedule configured for the API client.
    pub fn from_config(config: &ClientConfig) -> Self {
        match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(Duration::from_millis(config.retry_delay_ms)),
            BackoffKind::Exponential => Backoff::Exponential {
                base_ms: config.retry_delay_ms,
                max_ms: config.max_retry_delay_ms,
            },
        }
    }

    /// Delay to apply after `attempt` (1-based) failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base_ms, max_ms } => calculate_backoff(attempt, *base_ms, *max_ms),
        }
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
