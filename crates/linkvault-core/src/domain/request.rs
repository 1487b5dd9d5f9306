//! Request snapshots and queued requests
//!
//! A [`RequestSnapshot`] is an immutable, owned copy of an intercepted HTTP
//! request. It is built once and handed by value to both the immediate
//! delivery path and the retry queue, so the body never has to be re-read.
//!
//! A [`QueuedRequest`] is a snapshot plus the time it entered the retry
//! queue. Its JSON encoding is what the durable queue stores; request bodies
//! are kept as raw bytes and written as base64 there.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::DomainError;
use super::newtypes::BookmarkId;

/// Base used to read the path of origin-relative URLs
const RELATIVE_BASE: &str = "http://localhost/";

// ============================================================================
// RequestSnapshot
// ============================================================================

/// An owned copy of an HTTP request: method, URL, headers and body bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default, with = "body_base64")]
    body: Option<Vec<u8>>,
}

impl RequestSnapshot {
    /// Creates a snapshot with the given method (normalized to uppercase) and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a GET snapshot
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Builds a POST snapshot carrying `payload` as a JSON body
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized
    pub fn post_json<T: Serialize>(url: impl Into<String>, payload: &T) -> Result<Self, DomainError> {
        let body =
            serde_json::to_string(payload).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        Ok(Self::new("POST", url)
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Adds a header (builder style)
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body (builder style)
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// HTTP method in uppercase
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Absolute request URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All headers in insertion order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request body exactly as received, if any
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Case-insensitive header lookup (first match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this is a GET request
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Path component of the URL (`/` if the URL cannot be parsed)
    pub fn path(&self) -> String {
        Url::parse(RELATIVE_BASE)
            .and_then(|base| base.join(&self.url))
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    /// Key under which a GET response for this request is cached
    pub fn cache_key(&self) -> &str {
        &self.url
    }

    /// Decodes the body as a metadata-fetch payload `{id, url}`
    pub fn metadata_request(&self) -> Option<MetadataRequest> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice::<MetadataRequest>(b).ok())
    }
}

mod body_base64 {
    use base64::engine::general_purpose::GeneralPurpose;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const ENGINE: GeneralPurpose = base64::engine::general_purpose::STANDARD;

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        body.as_ref()
            .map(|bytes| ENGINE.encode(bytes))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| ENGINE.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// ============================================================================
// MetadataRequest - body of POST <metadata-path>
// ============================================================================

/// JSON body sent to the metadata endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRequest {
    /// Bookmark whose metadata is being fetched
    pub id: String,
    /// The bookmarked URL
    pub url: String,
}

impl MetadataRequest {
    /// Creates a new payload
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// The bookmark id, if it is a valid one
    pub fn bookmark_id(&self) -> Option<BookmarkId> {
        BookmarkId::new(self.id.as_str()).ok()
    }
}

// ============================================================================
// QueuedRequest
// ============================================================================

/// A request waiting in the retry queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    request: RequestSnapshot,
    enqueued_at: DateTime<Utc>,
}

impl QueuedRequest {
    /// Wraps a snapshot, stamping it with the current time
    pub fn new(request: RequestSnapshot) -> Self {
        Self::with_timestamp(request, Utc::now())
    }

    /// Wraps a snapshot with an explicit enqueue time
    pub fn with_timestamp(request: RequestSnapshot, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            request,
            enqueued_at,
        }
    }

    /// The request snapshot
    pub fn request(&self) -> &RequestSnapshot {
        &self.request
    }

    /// When the request first entered the queue
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Whether the entry has outlived `retention` at time `now`
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now - self.enqueued_at > retention
    }

    /// Bookmark this request refers to, if it is a metadata request
    pub fn bookmark_id(&self) -> Option<BookmarkId> {
        self.request
            .metadata_request()
            .and_then(|m| m.bookmark_id())
    }

    /// Serialized form stored by the durable queue
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string(self).map_err(|e| DomainError::InvalidBody(e.to_string()))
    }

    /// Parses the serialized form
    ///
    /// # Errors
    /// Returns error if the payload is not a valid queued request
    pub fn from_json(payload: &str) -> Result<Self, DomainError> {
        serde_json::from_str(payload).map_err(|e| DomainError::InvalidBody(e.to_string()))
    }
}
