//! HTTP fetcher port (driven/secondary port)
//!
//! Network access for both the sync engine and the interception router.
//! Transport errors and timeouts are `Err`; any HTTP status, including
//! 4xx/5xx, is a successful fetch.

use crate::domain::{HttpResponse, RequestSnapshot};

/// Sends a request snapshot over the network
#[async_trait::async_trait]
pub trait IHttpFetcher: Send + Sync {
    /// Sends `request` and buffers the full response
    async fn fetch(&self, request: &RequestSnapshot) -> anyhow::Result<HttpResponse>;
}
