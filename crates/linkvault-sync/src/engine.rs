//! Sync engine - drains the retry queue
//!
//! One drain cycle takes entries off the front of the queue one at a time,
//! delivers them, and reacts to the classified outcome:
//!
//! ```text
//! Draining ──► Delivering ──► success      ──► Advancing  (pause MIN_DELAY) ──► Draining
//!                         ├─► rate limited ──► Pausing    (unshift, abort cycle)
//!                         └─► failure      ──► BackingOff (push back, wait)  ──► Draining
//! Draining ──(queue empty)──► Idle
//! ```
//!
//! The consecutive-failure counter lives on the engine, so it spans cycles.
//! It resets on every success and when an entry is dropped after reaching the
//! failure limit. A rate-limited cycle ends with [`SyncError::RateLimited`]
//! carrying the server's delay, which the scheduler honours before the next
//! cycle.
//!
//! Nothing in a drain panics or aborts the host; storage errors end the cycle
//! with an error and the entry under delivery is put back whenever possible.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use linkvault_core::domain::{
    HttpResponse, ProcessResult, QueuedRequest, RequestSnapshot, RATE_LIMITED_REASON,
    RETRIES_EXHAUSTED_REASON,
};
use linkvault_core::ports::{IDataSink, IHttpFetcher, IRequestQueue};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::classifier::OutcomeClassifier;
use crate::client::DEFAULT_TIMEOUT;
use crate::SyncError;

/// Default number of consecutive failures before an entry is dropped
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

// ============================================================================
// Reports
// ============================================================================

/// Counters of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries delivered successfully
    pub delivered: u32,
    /// Entries dropped after too many consecutive failures
    pub dropped: u32,
    /// Failed attempts pushed back to the end of the queue
    pub requeued: u32,
}

/// Outcome of one delivery attempt, with the response when there was one
#[derive(Debug)]
pub struct Delivery {
    pub result: ProcessResult,
    pub response: Option<HttpResponse>,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Drains the retry queue with backoff and rate-limit handling
pub struct SyncEngine {
    queue: Arc<dyn IRequestQueue + Send + Sync>,
    fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
    sink: Arc<dyn IDataSink + Send + Sync>,
    classifier: OutcomeClassifier,
    backoff: BackoffPolicy,
    request_timeout: Duration,
    max_consecutive_failures: u32,
    consecutive_failures: AtomicU32,
    drain_lock: Mutex<()>,
    shutdown: CancellationToken,
}

impl SyncEngine {
    /// Creates an engine with default policy settings
    pub fn new(
        queue: Arc<dyn IRequestQueue + Send + Sync>,
        fetcher: Arc<dyn IHttpFetcher + Send + Sync>,
        sink: Arc<dyn IDataSink + Send + Sync>,
    ) -> Self {
        let backoff = BackoffPolicy::default();
        Self {
            queue,
            fetcher,
            classifier: OutcomeClassifier::new(Arc::clone(&sink), backoff),
            sink,
            backoff,
            request_timeout: DEFAULT_TIMEOUT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            consecutive_failures: AtomicU32::new(0),
            drain_lock: Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the delay policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self.classifier.set_backoff(backoff);
        self
    }

    /// Applies metadata side effects only to requests sent to `path`
    #[must_use]
    pub fn with_metadata_path(mut self, path: impl Into<String>) -> Self {
        self.classifier = self.classifier.with_metadata_path(path);
        self
    }

    /// Bounds each delivery attempt
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Number of consecutive failures after which an entry is dropped
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Stops drains early (between entries and during waits) once cancelled
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The delay policy in use
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Current value of the consecutive-failure counter
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Appends a request to the retry queue
    pub async fn enqueue(&self, request: RequestSnapshot) -> Result<(), SyncError> {
        let entry = QueuedRequest::new(request);
        self.queue.push(&entry).await.map_err(SyncError::Queue)?;
        info!(url = %entry.request().url(), "Request queued for background sync");
        Ok(())
    }

    /// Whether the queue currently holds entries
    pub async fn has_pending(&self) -> Result<bool, SyncError> {
        let empty = self.queue.is_empty().await.map_err(SyncError::Queue)?;
        Ok(!empty)
    }

    /// Sends a request once and classifies the outcome
    ///
    /// The attempt is bounded by the request timeout; elapsing it counts as
    /// an ordinary failure.
    pub async fn deliver(&self, request: &RequestSnapshot) -> Delivery {
        let outcome = match tokio::time::timeout(self.request_timeout, self.fetcher.fetch(request))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(anyhow::anyhow!(
                "Request timed out after {}s",
                self.request_timeout.as_secs()
            )),
        };

        let result = self.classifier.classify(request, &outcome).await;
        Delivery {
            result,
            response: outcome.ok(),
        }
    }

    /// Marks the bookmark behind `request` (if any) as pending
    pub async fn mark_pending(&self, request: &RequestSnapshot) -> Result<(), SyncError> {
        let Some(id) = self.classifier.metadata_target(request).and_then(|m| m.bookmark_id()) else {
            return Ok(());
        };
        self.sink.set_pending(&id).await.map_err(SyncError::Sink)
    }

    /// Marks the bookmark behind `request` (if any) as failed with `reason`
    pub async fn mark_error(&self, request: &RequestSnapshot, reason: &str) -> Result<(), SyncError> {
        let Some(id) = self.classifier.metadata_target(request).and_then(|m| m.bookmark_id()) else {
            return Ok(());
        };
        self.sink
            .set_error(&id, reason)
            .await
            .map_err(SyncError::Sink)
    }

    /// Runs one drain cycle
    ///
    /// Returns the cycle's counters once the queue is empty (or shutdown was
    /// requested). A concurrent call while a drain is running returns an empty
    /// report immediately.
    ///
    /// # Errors
    ///
    /// - [`SyncError::RateLimited`] when the server answered 429; the entry is
    ///   back at the queue front.
    /// - [`SyncError::Queue`] when the queue storage fails.
    #[tracing::instrument(skip(self))]
    pub async fn drain(&self) -> Result<DrainReport, SyncError> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            debug!("Drain already in progress");
            return Ok(DrainReport::default());
        };

        let mut report = DrainReport::default();

        while !self.shutdown.is_cancelled() {
            let Some(entry) = self.queue.shift().await.map_err(SyncError::Queue)? else {
                break;
            };

            let delivery = tokio::select! {
                delivery = self.deliver(entry.request()) => delivery,
                _ = self.shutdown.cancelled() => {
                    self.queue.unshift(&entry).await.map_err(SyncError::Queue)?;
                    break;
                }
            };
            let result = delivery.result;

            if result.success {
                self.consecutive_failures.store(0, Ordering::Release);
                report.delivered += 1;
                debug!(url = %entry.request().url(), "Queued request delivered");

                if self.has_pending().await? {
                    self.pause(self.backoff.min_delay).await;
                }
                continue;
            }

            if result.is_rate_limited {
                let retry_after = result
                    .retry_after
                    .unwrap_or(self.backoff.default_rate_limit_delay);

                if let Err(e) = self.mark_error(entry.request(), RATE_LIMITED_REASON).await {
                    warn!(error = %e, "Could not record rate-limited state");
                }
                self.queue.unshift(&entry).await.map_err(SyncError::Queue)?;

                info!(
                    retry_after_ms = retry_after.as_millis() as u64,
                    delivered = report.delivered,
                    "Rate limited, pausing drain"
                );
                return Err(SyncError::RateLimited { retry_after });
            }

            let attempt = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

            if attempt >= self.max_consecutive_failures {
                warn!(
                    url = %entry.request().url(),
                    attempt,
                    "Dropping request after repeated failures"
                );
                if let Err(e) = self.mark_error(entry.request(), RETRIES_EXHAUSTED_REASON).await {
                    error!(error = %e, "Could not record failed state");
                }
                self.consecutive_failures.store(0, Ordering::Release);
                report.dropped += 1;
                continue;
            }

            let delay = self.backoff.compute_backoff(attempt);
            // Persist before waiting so a shutdown during the wait loses nothing.
            self.queue.push(&entry).await.map_err(SyncError::Queue)?;
            report.requeued += 1;
            debug!(
                url = %entry.request().url(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Delivery failed, backing off"
            );
            self.pause(delay).await;
        }

        info!(
            delivered = report.delivered,
            dropped = report.dropped,
            requeued = report.requeued,
            "Drain cycle finished"
        );
        Ok(report)
    }

    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.shutdown.cancelled() => {}
        }
    }
}
