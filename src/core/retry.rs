//! Retry policy for failed send attempts.
//!
//! Maps `(error, attempt)` to either a delay before the next attempt or
//! abandonment. Attempts are zero-based: attempt `k` failing with a retryable
//! error schedules attempt `k + 1` after `base * 2^k`, for `k < max_retries`.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::SendError;

/// Outcome of consulting the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then make the next attempt.
    RetryAfter(Duration),
    /// Stop; the job is terminally failed.
    Abandon,
}

/// Backoff and retry limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt before giving up.
    pub max_retries: u32,
    /// Delay unit; attempt `k` waits `base_delay * 2^k`.
    pub base_delay: Duration,
    /// Upper bound for a single backoff (jitter excluded).
    pub max_delay: Duration,
    /// Add uniform `[0, 1)` second jitter to rate-limit backoffs.
    pub rate_limit_jitter: bool,
    /// Retry permanent errors with plain backoff instead of failing fast.
    pub retry_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            rate_limit_jitter: true,
            retry_permanent: false,
        }
    }
}

impl RetryPolicy {
    /// Whether attempt `attempt` may be followed by another.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Total attempts a job may make.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential delay for attempt `attempt`, capped at `max_delay`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Decide what to do after attempt `attempt` failed with `error`.
    pub fn decide<R>(&self, error: &SendError, attempt: u32, rng: &mut R) -> RetryDecision
    where
        R: Rng + ?Sized,
    {
        if !self.should_retry(attempt) {
            return RetryDecision::Abandon;
        }
        match error {
            SendError::RateLimited { retry_after, .. } => {
                let mut delay = self.backoff(attempt);
                if let Some(hint) = retry_after {
                    delay = delay.max((*hint).min(self.max_delay));
                }
                if self.rate_limit_jitter {
                    delay += Duration::from_secs_f64(rng.random_range(0.0..1.0));
                }
                RetryDecision::RetryAfter(delay)
            }
            SendError::Transient { .. } => RetryDecision::RetryAfter(self.backoff(attempt)),
            SendError::Permanent { .. } if self.retry_permanent => {
                RetryDecision::RetryAfter(self.backoff(attempt))
            }
            SendError::Permanent { .. } => RetryDecision::Abandon,
        }
    }
}
