//! HTTP fetcher backed by reqwest
//!
//! Implements [`IHttpFetcher`] for both the sync engine and the offline
//! router. Relative URLs are resolved against the configured origin. Each
//! request is bounded by a timeout; a timeout surfaces as an `Err`, which the
//! classifier treats as an ordinary failure.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use linkvault_core::domain::RequestSnapshot;
//! use linkvault_core::ports::IHttpFetcher;
//! use linkvault_sync::client::HttpFetcher;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = HttpFetcher::new("http://127.0.0.1:5173", Duration::from_secs(40))?;
//! let response = fetcher.fetch(&RequestSnapshot::get("/")).await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use linkvault_core::domain::{HttpResponse, RequestSnapshot};
use linkvault_core::ports::IHttpFetcher;
use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

/// Default timeout of one request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(40);

/// Request headers that describe the connection rather than the request
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Sends [`RequestSnapshot`]s to the application origin
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher for the origin at `base_url`
    ///
    /// # Errors
    /// Returns error if `base_url` is not a valid absolute URL
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid origin URL: {base_url}"))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            timeout,
        })
    }

    /// The origin requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `url` against the origin (absolute URLs pass through)
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.base_url
            .join(url)
            .with_context(|| format!("Invalid request URL: {url}"))
    }
}

#[async_trait::async_trait]
impl IHttpFetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestSnapshot) -> Result<HttpResponse> {
        let url = self.resolve(request.url())?;
        let method = Method::from_bytes(request.method().as_bytes())
            .with_context(|| format!("Invalid HTTP method: {}", request.method()))?;

        debug!(method = %method, url = %url, "Sending request");

        let mut builder = self.client.request(method, url.clone()).timeout(self.timeout);
        for (name, value) in request.headers() {
            if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))?;

        debug!(url = %url, status, bytes = body.len(), "Response received");

        Ok(headers
            .into_iter()
            .fold(HttpResponse::new(status), |resp, (k, v)| resp.with_header(k, v))
            .with_body(body.to_vec()))
    }
}
