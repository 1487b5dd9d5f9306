//! Bookmark metadata and its fetch state
//!
//! A bookmark's metadata is always in exactly one [`BookmarkMetadataState`].
//! The sync engine and the initial fetch call drive the transitions:
//!
//! ```text
//! Pending ──success──► Success
//!    │                    ▲
//!    └──error──► Error ───┘ (a later retry succeeds)
//! ```

use serde::{Deserialize, Serialize};

/// Reason recorded while a rate-limited request waits at the queue front
pub const RATE_LIMITED_REASON: &str = "Rate limited - will retry automatically";

/// Reason recorded when a request is dropped after repeated failures
pub const RETRIES_EXHAUSTED_REASON: &str = "Failed to fetch metadata after multiple retries";

/// Metadata extracted from a bookmarked page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
}

/// Fetch state of a bookmark's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookmarkMetadataState {
    /// A fetch is in flight or queued
    Pending,
    /// The last attempt failed
    Error {
        /// Human-readable reason shown next to the bookmark
        reason: String,
    },
    /// Metadata was fetched and stored
    Success(BookmarkMetadata),
}

impl BookmarkMetadataState {
    /// Short state name for logs and storage
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Error { .. } => "error",
            Self::Success(_) => "success",
        }
    }

    /// Error reason, if in the error state
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// Stored metadata, if in the success state
    pub fn metadata(&self) -> Option<&BookmarkMetadata> {
        match self {
            Self::Success(metadata) => Some(metadata),
            _ => None,
        }
    }
}

/// Successful payload of the metadata endpoint
///
/// Everything but `bookmarkId` is optional; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub bookmark_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    /// Favicon as a `data:` URL, when the endpoint could inline it
    #[serde(default)]
    pub favicon_base64: Option<String>,
    /// Why the favicon could not be inlined
    #[serde(default)]
    pub favicon_error: Option<String>,
}

impl MetadataResponse {
    /// Splits the payload into the metadata to store
    pub fn to_metadata(&self) -> BookmarkMetadata {
        BookmarkMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            keywords: self.keywords.clone(),
            image: self.image.clone(),
            favicon: self.favicon.clone(),
            author: self.author.clone(),
            publisher: self.publisher.clone(),
            date_published: self.date_published.clone(),
            date_modified: self.date_modified.clone(),
        }
    }
}
