//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;

// ============================================================================
// Bookmark identifier
// ============================================================================

/// Identifier of a bookmark in the application database
///
/// Bookmark ids are opaque strings (UUIDs generated by the UI layer). The only
/// requirement enforced here is that they are non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookmarkId(String);

impl BookmarkId {
    /// Create a new BookmarkId
    ///
    /// # Errors
    /// Returns error if the id is empty or whitespace only
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidId(
                "Bookmark id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BookmarkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookmarkId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BookmarkId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BookmarkId> for String {
    fn from(id: BookmarkId) -> Self {
        id.0
    }
}

// ============================================================================
// Domain (favicon cache key)
// ============================================================================

/// A lowercase hostname, e.g. "github.com"
///
/// Favicons are cached per domain, so every bookmark on the same host shares
/// one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Create a new Domain from a bare hostname
    ///
    /// # Errors
    /// Returns error if the hostname is empty or contains a scheme/path separator
    pub fn new(host: impl Into<String>) -> Result<Self, DomainError> {
        let host = host.into().trim().to_ascii_lowercase();
        if host.is_empty() {
            return Err(DomainError::InvalidDomain("empty hostname".to_string()));
        }
        if host.contains('/') || host.contains(char::is_whitespace) {
            return Err(DomainError::InvalidDomain(host));
        }
        Ok(Self(host))
    }

    /// Extract the domain from an absolute URL
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed or has no host
    pub fn from_url(url: &str) -> Result<Self, DomainError> {
        let parsed =
            Url::parse(url).map_err(|e| DomainError::InvalidUrl(format!("{url}: {e}")))?;
        match parsed.host_str() {
            Some(host) => Self::new(host),
            None => Err(DomainError::InvalidUrl(format!("{url}: URL has no host"))),
        }
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

/// Extract the hostname of a URL, or an empty string if the URL is invalid
#[must_use]
pub fn extract_domain(url: &str) -> String {
    Domain::from_url(url)
        .map(String::from)
        .unwrap_or_default()
}
