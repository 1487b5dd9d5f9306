//! Outcome classification for metadata deliveries
//!
//! Turns the result of one network attempt into a [`ProcessResult`]:
//!
//! | Outcome                         | Result                              |
//! |---------------------------------|-------------------------------------|
//! | HTTP 429                        | rate limited, `Retry-After` parsed  |
//! | other non-2xx                   | failure                             |
//! | transport error / timeout       | failure                             |
//! | 2xx with a malformed payload    | failure                             |
//! | 2xx with a well-formed payload  | side effects stored, success        |
//!
//! Side effects of a success go through the [`IDataSink`]: the metadata state
//! of the bookmark, and the favicon of the bookmarked site's domain. Requests
//! whose body is not a `{id, url}` metadata payload have no side effects, and
//! any 2xx completes them.

use std::sync::Arc;

use linkvault_core::domain::{
    BookmarkId, Domain, HttpResponse, MetadataRequest, MetadataResponse, ProcessResult,
    RequestSnapshot,
};
use linkvault_core::ports::IDataSink;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;

/// HTTP status signalling rate limiting
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Classifies delivery attempts and applies the side effects of successes
pub struct OutcomeClassifier {
    sink: Arc<dyn IDataSink + Send + Sync>,
    backoff: BackoffPolicy,
    metadata_path: Option<String>,
}

impl OutcomeClassifier {
    /// Creates a classifier writing through `sink`
    pub fn new(sink: Arc<dyn IDataSink + Send + Sync>, backoff: BackoffPolicy) -> Self {
        Self {
            sink,
            backoff,
            metadata_path: None,
        }
    }

    /// Restricts metadata side effects to requests sent to `path`
    #[must_use]
    pub fn with_metadata_path(mut self, path: impl Into<String>) -> Self {
        self.metadata_path = Some(path.into());
        self
    }

    pub(crate) fn set_backoff(&mut self, backoff: BackoffPolicy) {
        self.backoff = backoff;
    }

    /// The `{id, url}` payload of `request`, if it targets the metadata endpoint
    pub fn metadata_target(&self, request: &RequestSnapshot) -> Option<MetadataRequest> {
        if let Some(path) = &self.metadata_path {
            if request.path() != *path {
                return None;
            }
        }
        request.metadata_request()
    }

    /// Classifies the outcome of sending `request`
    ///
    /// Never fails: any problem handling a success payload downgrades the
    /// attempt to an ordinary failure so it is retried.
    pub async fn classify(
        &self,
        request: &RequestSnapshot,
        outcome: &anyhow::Result<HttpResponse>,
    ) -> ProcessResult {
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Delivery failed");
                return ProcessResult::failure();
            }
        };

        if response.status() == STATUS_TOO_MANY_REQUESTS {
            let retry_after = self.backoff.parse_retry_after(response.header("retry-after"));
            info!(
                url = %request.url(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limited (429)"
            );
            return ProcessResult::rate_limited(retry_after);
        }

        if !response.is_success() {
            warn!(url = %request.url(), status = response.status(), "Delivery rejected");
            return ProcessResult::failure();
        }

        match self.apply_success(request, response).await {
            Ok(()) => ProcessResult::success(),
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Could not handle metadata response");
                ProcessResult::failure()
            }
        }
    }

    async fn apply_success(
        &self,
        request: &RequestSnapshot,
        response: &HttpResponse,
    ) -> anyhow::Result<()> {
        // Only metadata requests carry side effects; any other 2xx is done.
        let Some(metadata_request) = self.metadata_target(request) else {
            return Ok(());
        };

        let payload: MetadataResponse = response.parse_json()?;
        let bookmark_id = BookmarkId::new(payload.bookmark_id.as_str())?;

        self.sink
            .set_success(&bookmark_id, &payload.to_metadata(), payload.title.as_deref())
            .await?;
        debug!(bookmark_id = %bookmark_id, "Metadata stored");

        let Ok(domain) = Domain::from_url(&metadata_request.url) else {
            return Ok(());
        };

        if let Some(data) = payload.favicon_base64.as_deref() {
            self.sink
                .save_favicon(&domain, Some(data), false, None)
                .await?;
        } else if let Some(reason) = payload.favicon_error.as_deref() {
            self.sink
                .save_favicon(&domain, None, true, Some(reason))
                .await?;
        }

        Ok(())
    }
}
