//! Retry Policy Module
//!
//! Backoff schedule for upstream fetches.
//! Delays grow 400ms → 800ms → 1.6s → 3.2s (plus jitter), capped at 8s.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::HeaderValue;

// == Retry Policy ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling for computed (not server-supplied) delays
    pub max_delay: Duration,
    /// Upper bound of the random component added to computed delays
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(8),
            max_jitter: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    // == Delay For ==
    /// Delay to wait after failed `attempt` (1-based).
    ///
    /// A server-supplied `Retry-After` wins verbatim; otherwise
    /// `base * 2^(attempt-1) + jitter`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after.filter(|d| !d.is_zero()) {
            return hint;
        }

        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };

        (self.exponential(attempt) + jitter).min(self.max_delay)
    }

    fn exponential(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

// == Parse Retry-After ==
/// Reads a `Retry-After` header: delta-seconds or an HTTP-date.
///
/// Zero, past dates and garbage yield `None`.
pub fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    let raw = value.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return (seconds > 0).then(|| Duration::from_secs(seconds));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    (at - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
}
