//! Favicon cache entries
//!
//! Favicons are cached per [`Domain`]. A failed lookup is remembered so the
//! same host is not hammered on every bookmark, and retried once the failure
//! is older than [`RETRY_WINDOW_MS`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::Domain;

/// A failed favicon lookup becomes retryable after seven days
pub const RETRY_WINDOW_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Why a favicon could not be stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaviconFailure {
    /// Icon exceeded the size limit
    TooLarge,
    /// Icon could not be downloaded
    FetchError,
    /// Downloaded bytes were not an image
    InvalidImage,
}

impl FaviconFailure {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::FetchError => "fetch_error",
            Self::InvalidImage => "invalid_image",
        }
    }
}

impl fmt::Display for FaviconFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaviconFailure {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "too_large" => Ok(Self::TooLarge),
            "fetch_error" => Ok(Self::FetchError),
            "invalid_image" => Ok(Self::InvalidImage),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown favicon failure reason: {other}"
            ))),
        }
    }
}

/// One row of the favicon cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconCacheEntry {
    pub domain: Domain,
    /// `data:` URL of the icon, absent for failed lookups
    pub data: Option<String>,
    pub failed: bool,
    /// Free-form reason; usually one of the [`FaviconFailure`] strings
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FaviconCacheEntry {
    /// A successfully fetched icon
    pub fn success(domain: Domain, data: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            domain,
            data: Some(data.into()),
            failed: false,
            failed_reason: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// A failed lookup
    pub fn failure(domain: Domain, reason: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            domain,
            data: None,
            failed: true,
            failed_reason: reason,
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether a failed lookup may be attempted again at `now`
    pub fn should_retry(&self, now: DateTime<Utc>) -> bool {
        self.failed && now - self.modified_at > Duration::milliseconds(RETRY_WINDOW_MS)
    }
}
