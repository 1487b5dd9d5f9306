//! Outcome of a single delivery attempt

use std::time::Duration;

/// Result of one attempt to deliver a queued request
///
/// Never persisted. `retry_after` is only set for rate-limited attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResult {
    pub success: bool,
    pub retry_after: Option<Duration>,
    pub is_rate_limited: bool,
}

impl ProcessResult {
    /// The request was delivered and its side effects stored
    pub fn success() -> Self {
        Self {
            success: true,
            retry_after: None,
            is_rate_limited: false,
        }
    }

    /// Transient failure (network error, timeout, error status, bad payload)
    pub fn failure() -> Self {
        Self {
            success: false,
            retry_after: None,
            is_rate_limited: false,
        }
    }

    /// The server answered 429
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self {
            success: false,
            retry_after: Some(retry_after),
            is_rate_limited: true,
        }
    }
}
