//! Retry delay policy
//!
//! Two sources of delay:
//!
//! - [`BackoffPolicy::compute_backoff`]: exponential backoff with ±25% jitter
//!   for ordinary failures, `min(MIN * 2^attempt, MAX)`.
//! - [`BackoffPolicy::parse_retry_after`]: the server's `Retry-After` hint on a
//!   429, either delta-seconds or an HTTP-date.
//!
//! A server hint always wins over computed backoff.
//!
//! ## Usage
//!
//! ```rust
//! use linkvault_sync::backoff::{parse_retry_after, BackoffPolicy};
//! use std::time::Duration;
//!
//! assert_eq!(parse_retry_after(Some("30")), Duration::from_secs(30));
//! assert_eq!(BackoffPolicy::default().compute_backoff_with_jitter(0, 0.0), Duration::from_secs(15));
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use linkvault_core::config::SyncConfig;
use linkvault_core::domain::parse_http_date;
use rand::Rng;
use tracing::warn;

/// Base delay between retries, and the throttle between successful deliveries
pub const MIN_DELAY: Duration = Duration::from_millis(15_000);

/// Upper bound for any computed or server-requested delay
pub const MAX_DELAY: Duration = Duration::from_millis(300_000);

/// Delay used for a 429 without a usable `Retry-After`
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(60_000);

/// Jitter amplitude as a fraction of the base delay
const JITTER_FACTOR: f64 = 0.25;

/// Delay bounds used by the sync engine and scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub default_rate_limit_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_delay: MIN_DELAY,
            max_delay: MAX_DELAY,
            default_rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Builds the policy from the `sync` configuration section
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            default_rate_limit_delay: Duration::from_millis(config.default_rate_limit_delay_ms),
        }
    }

    /// Un-jittered delay for `attempt`: `min(MIN * 2^attempt, MAX)`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let base = min_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(base.min(max_ms))
    }

    /// Exponential backoff with uniform ±25% jitter
    pub fn compute_backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(-1.0..=1.0);
        self.compute_backoff_with_jitter(attempt, jitter)
    }

    /// Exponential backoff with the jitter pinned to `jitter` in `[-1, 1]`
    ///
    /// `-1` yields 75% of the base delay, `0` the base delay, `1` 125%. The
    /// result never exceeds the maximum delay.
    pub fn compute_backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let capped = self.base_delay(attempt).as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let jitter = jitter.clamp(-1.0, 1.0);
        let delay = (capped + capped * JITTER_FACTOR * jitter).round();
        Duration::from_millis(delay.clamp(0.0, max_ms) as u64)
    }

    /// Interprets a `Retry-After` header value
    pub fn parse_retry_after(&self, value: Option<&str>) -> Duration {
        self.parse_retry_after_at(value, Utc::now())
    }

    /// Same as [`parse_retry_after`](Self::parse_retry_after) with an explicit clock
    ///
    /// - missing or unparseable: the default rate-limit delay
    /// - leading integer: seconds, capped at the maximum, never negative
    /// - HTTP-date: time until the date, clamped to `[MIN, MAX]`
    pub fn parse_retry_after_at(&self, value: Option<&str>, now: DateTime<Utc>) -> Duration {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return self.default_rate_limit_delay;
        };

        let max_ms = self.max_delay.as_millis() as i64;

        if let Some(seconds) = leading_integer(value) {
            let ms = seconds.saturating_mul(1000).clamp(0, max_ms);
            return Duration::from_millis(ms as u64);
        }

        if let Some(date) = parse_http_date(value) {
            let min_ms = self.min_delay.as_millis() as i64;
            let delta_ms = (date - now).num_milliseconds();
            let ms = delta_ms.min(max_ms).max(min_ms);
            return Duration::from_millis(ms as u64);
        }

        warn!(value, "Could not parse Retry-After header, using default");
        self.default_rate_limit_delay
    }
}

/// Leading base-10 integer of `s`, ignoring anything after the digits
///
/// `"30"` and `"30s"` both give 30; `"-5"` gives -5; `"abc"` gives `None`.
fn leading_integer(s: &str) -> Option<i64> {
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// [`BackoffPolicy::compute_backoff`] with the default bounds
pub fn compute_backoff(attempt: u32) -> Duration {
    BackoffPolicy::default().compute_backoff(attempt)
}

/// [`BackoffPolicy::parse_retry_after`] with the default bounds
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    BackoffPolicy::default().parse_retry_after(value)
}
