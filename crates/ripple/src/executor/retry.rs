//! Retry policy for failed attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backoff {
    /// Same delay before every retry
    #[default]
    Fixed,
    /// Delay doubles after each failure, up to `max_delay_ms`
    Exponential,
}

/// Bounded retries with backoff.
///
/// `max_attempts` counts the first attempt, so `1` means no retries. A value
/// of `0` is treated as `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Total attempts allowed
    pub max_attempts: u32,
    /// Delay growth
    pub backoff: Backoff,
    /// Base delay in milliseconds
    pub delay_ms: u64,
    /// Upper bound for exponential delays in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed,
            delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, never retried.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Up to `max_attempts` attempts with a constant delay.
    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed,
            delay_ms: duration_ms(delay),
            max_delay_ms: duration_ms(delay),
        }
    }

    /// Up to `max_attempts` attempts, doubling the delay from `initial` up to `max`.
    #[must_use]
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential,
            delay_ms: duration_ms(initial),
            max_delay_ms: duration_ms(max),
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    #[must_use]
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }

    /// Delay before the next attempt, after `failures` failed attempts (>= 1).
    #[must_use]
    pub fn delay_after(&self, failures: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => {
                let exponent = failures.saturating_sub(1).min(63);
                self.delay_ms
                    .saturating_mul(1u64 << exponent)
                    .min(self.max_delay_ms.max(self.delay_ms))
            }
        };
        Duration::from_millis(ms)
    }
}

/// Whole milliseconds of a duration, saturating.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
