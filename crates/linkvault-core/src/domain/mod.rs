//! Domain entities and business logic
//!
//! This module contains the core domain types for LinkVault:
//! - Newtypes for bookmark ids and favicon domains
//! - Request snapshots and queued requests
//! - HTTP responses as owned values
//! - Bookmark metadata state and favicon cache entries
//! - Domain-specific error types

pub mod errors;
pub mod favicon;
pub mod metadata;
pub mod newtypes;
pub mod outcome;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use errors::DomainError;
pub use favicon::{FaviconCacheEntry, FaviconFailure, RETRY_WINDOW_MS};
pub use metadata::{
    BookmarkMetadata, BookmarkMetadataState, MetadataResponse, RATE_LIMITED_REASON,
    RETRIES_EXHAUSTED_REASON,
};
pub use newtypes::*;
pub use outcome::ProcessResult;
pub use request::{MetadataRequest, QueuedRequest, RequestSnapshot};
pub use response::{parse_http_date, HttpResponse, OFFLINE_SHELL_HTML};
