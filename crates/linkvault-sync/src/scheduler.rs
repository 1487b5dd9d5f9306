//! Sync scheduler - decides when drain cycles run
//!
//! The [`SyncScheduler`] owns the loop that invokes
//! [`SyncEngine::drain`](super::engine::SyncEngine::drain). A cycle starts on:
//!
//! - the periodic poll interval (the first tick fires immediately, so entries
//!   left over from a previous run are retried at startup);
//! - an on-demand [`SyncTrigger`], fired by the router right after it enqueues
//!   a request.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──┐
//!                 ├──► drain ──► Ok                 ──► wait for next tick/trigger
//! SyncTrigger ────┘          ├─► RateLimited(delay) ──► sleep(delay) ──► drain
//!                            └─► other error        ──► sleep(backoff) ──► drain
//! ```
//!
//! Triggers that arrive while the scheduler is waiting out a rate limit do not
//! shorten the wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::SyncError;

// ============================================================================
// SyncTrigger
// ============================================================================

/// Handle that requests an immediate drain cycle
///
/// Cheap to clone. Multiple requests made while a cycle is running collapse
/// into a single follow-up cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a drain as soon as the scheduler is idle
    pub fn request_sync(&self) {
        debug!("Sync requested");
        self.notify.notify_one();
    }

    /// Waits for the next request
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Runs drain cycles on a timer, on demand, and after rate-limit pauses
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    trigger: SyncTrigger,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    /// Creates a scheduler and the trigger used to request drains
    pub fn new(
        engine: Arc<SyncEngine>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> (Self, SyncTrigger) {
        let trigger = SyncTrigger::new();

        info!(
            poll_ms = poll_interval.as_millis() as u64,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            engine,
            trigger: trigger.clone(),
            poll_interval,
            shutdown,
        };
        (scheduler, trigger)
    }

    /// Main loop; returns once the shutdown token is cancelled
    pub async fn run(self) {
        info!("Sync scheduler starting");

        let mut poll_timer = tokio::time::interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut failed_cycles: u32 = 0;
        let mut next_wait: Option<Duration> = None;

        loop {
            match next_wait.take() {
                Some(delay) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = poll_timer.tick() => debug!("Periodic sync"),
                        _ = self.trigger.notified() => debug!("On-demand sync"),
                    }
                }
            }

            next_wait = match self.engine.drain().await {
                Ok(report) => {
                    failed_cycles = 0;
                    if report.dropped > 0 {
                        warn!(dropped = report.dropped, "Requests dropped during sync");
                    }
                    None
                }
                Err(SyncError::RateLimited { retry_after }) => {
                    info!(
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Sync paused by rate limit"
                    );
                    Some(retry_after)
                }
                Err(e) => {
                    failed_cycles = failed_cycles.saturating_add(1);
                    let delay = self.engine.backoff().compute_backoff(failed_cycles);
                    warn!(
                        error = %e,
                        attempt = failed_cycles,
                        delay_ms = delay.as_millis() as u64,
                        "Sync cycle failed"
                    );
                    Some(delay)
                }
            };
        }

        info!("Sync scheduler stopped");
    }
}

// ============================================================================
// Unit tests
// ============================================================================
