//! HTTP responses as plain values
//!
//! [`HttpResponse`] is what the fetcher returns, what the cache stores and what
//! the router hands back to the proxy. It owns its body so a response can be
//! cloned into a cache and returned to the caller without re-reading a stream.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Minimal page served when an application route cannot be reached and no
/// shell was cached.
pub const OFFLINE_SHELL_HTML: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>LinkVault (offline)</title></head>\
<body><div id=\"app\"></div>\
<p>You are offline. Cached bookmarks will appear once the app loads.</p>\
</body></html>";

/// Obsolete HTTP-date layouts still accepted from servers (RFC 850, asctime)
const LEGACY_HTTP_DATE_FORMATS: &[&str] = &["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parses an HTTP-date in any of its three forms
///
/// The preferred IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`) is read as
/// RFC 2822; the RFC 850 and asctime forms are assumed to be UTC.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Ok(date) = DateTime::parse_from_rfc2822(&value) {
        return Some(date.with_timezone(&Utc));
    }
    LEGACY_HTTP_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// An HTTP response with an owned body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: Vec<u8>,
}

impl HttpResponse {
    /// Creates an empty response with the given status
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Builds a JSON response, setting `Content-Type`
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(body))
    }

    /// Synthesized offline shell, stamped with the current `Date`
    pub fn offline_shell() -> Self {
        Self::new(200)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(OFFLINE_SHELL_HTML.as_bytes().to_vec())
            .with_date(Utc::now())
    }

    /// `202 Accepted` acknowledgement returned when a request was deferred
    pub fn queued_ack() -> Self {
        Self::new(202)
            .with_header("Content-Type", "application/json")
            .with_body(
                br#"{"queued":true,"message":"Request queued for background sync"}"#.to_vec(),
            )
    }

    /// Adds a header (builder style)
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body (builder style)
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets (or replaces) the `Date` header
    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case("date"));
        self.headers.push(("Date".to_string(), date.to_rfc2822()));
        self
    }

    /// HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// All headers in order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Response body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response, returning the body
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Case-insensitive header lookup (first match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `2xx`
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parsed `Date` header, if present and valid
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header("date").and_then(parse_http_date)
    }

    /// Deserializes the body as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
