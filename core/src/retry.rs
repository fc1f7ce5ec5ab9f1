//! Rate-limit handling: `Retry-After` parsing, retry bounds and sleeping.
//!
//! # Design
//! Zendesk answers 429 with a plain number in `Retry-After`. GET calls read
//! that number as seconds while the mutating verbs read it as minutes; the
//! default policy keeps that split and `RetryPolicy::with_unit` unifies it.
//!
//! Retries are bounded twice: by count (`max_retries`) and by the total time
//! spent sleeping (`max_total_wait`). Sleeping goes through `Sleeper` so
//! tests can record delays instead of blocking.

use std::time::Duration;

use crate::http::HttpMethod;

/// How a numeric `Retry-After` value is scaled into a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfterUnit {
    Seconds,
    Minutes,
}

impl RetryAfterUnit {
    fn seconds(&self) -> f64 {
        match self {
            RetryAfterUnit::Seconds => 1.0,
            RetryAfterUnit::Minutes => 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of sleeps before giving up with `RateLimitExceeded`.
    pub max_retries: u32,
    /// Upper bound on the summed sleep time of one call.
    pub max_total_wait: Duration,
    /// When set, every verb uses this unit instead of the per-verb default.
    pub unit: Option<RetryAfterUnit>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_total_wait: Duration::from_secs(15 * 60),
            unit: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_total_wait(mut self, max_total_wait: Duration) -> Self {
        self.max_total_wait = max_total_wait;
        self
    }

    pub fn with_unit(mut self, unit: RetryAfterUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Unit used to interpret `Retry-After` for `method`.
    pub fn unit_for(&self, method: HttpMethod) -> RetryAfterUnit {
        self.unit.unwrap_or(match method {
            HttpMethod::Get => RetryAfterUnit::Seconds,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete => RetryAfterUnit::Minutes,
        })
    }
}

/// Parse a `Retry-After` value into a delay.
///
/// Accepts a non-negative decimal number (`"2"`, `"0.5"`). Anything else,
/// including HTTP dates, yields `None` and the response is not retried.
pub fn parse_retry_after(value: &str, unit: RetryAfterUnit) -> Option<Duration> {
    let amount: f64 = value.trim().parse().ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(amount * unit.seconds()).ok()
}

/// Blocks the calling thread between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
