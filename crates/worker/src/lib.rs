//! Scan worker: claims pending scans and drives them to a terminal state.
//!
//! Each runner loop claims one scan at a time via the repository's
//! `FOR UPDATE SKIP LOCKED` claim, so any number of runner tasks — and any
//! number of worker processes — can poll the same table without
//! double-dispatch. The terminal status write always commits before the
//! batch aggregator is notified; an aggregation failure is logged and left
//! for the recount design to self-heal on the next notification.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use accesspulse_core::status::ScanStatus;
use accesspulse_core::wcag::WcagLevel;
use accesspulse_db::models::scan::Scan;
use accesspulse_db::models::scan_result::NewScanResult;
use accesspulse_db::repositories::{CampaignRepo, ScanRepo, ScanResultRepo};
use accesspulse_db::DbPool;
use accesspulse_events::bus::{EVENT_SCAN_COMPLETED, EVENT_SCAN_FAILED};
use accesspulse_events::{EventBus, PlatformEvent};
use accesspulse_pipeline::BatchAggregator;
use accesspulse_scanner::ScanEngine;

/// Default polling interval when the queue is empty.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of concurrent runner tasks per worker process.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A single worker: polls for pending scans and executes them.
pub struct ScanRunner {
    pool: DbPool,
    engine: Arc<dyn ScanEngine>,
    bus: Arc<EventBus>,
    poll_interval: Duration,
}

impl ScanRunner {
    /// Create a runner with the default 1-second poll interval.
    pub fn new(pool: DbPool, engine: Arc<dyn ScanEngine>, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            engine,
            bus,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Run the claim-execute loop until the cancellation token fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scan runner shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain the queue before going back to sleep.
                    loop {
                        match ScanRepo::claim_next(&self.pool).await {
                            Ok(Some(scan)) => self.process(scan).await,
                            Ok(None) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to claim next scan");
                                break;
                            }
                        }
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Execute one claimed scan through to its terminal state.
    async fn process(&self, scan: Scan) {
        tracing::info!(scan_id = scan.id, url = %scan.url, "Scan claimed");

        let terminal = match self.execute(&scan).await {
            Ok(duration_ms) => {
                if let Err(e) = ScanRepo::complete(&self.pool, scan.id, duration_ms).await {
                    tracing::error!(scan_id = scan.id, error = %e, "Failed to mark scan completed");
                    return;
                }
                ScanStatus::Completed
            }
            Err(message) => {
                tracing::warn!(scan_id = scan.id, error = %message, "Scan failed");
                if let Err(e) = ScanRepo::fail(&self.pool, scan.id, &message, None).await {
                    tracing::error!(scan_id = scan.id, error = %e, "Failed to mark scan failed");
                    return;
                }
                self.abandon_ai_reservation(&scan).await;
                ScanStatus::Failed
            }
        };

        // The terminal status is committed; everything below is downstream
        // and must never undo it.
        self.publish_terminal_event(&scan, terminal);
        self.notify_aggregator(&scan, terminal).await;
    }

    /// Run the engine and record the result row. Returns the duration on
    /// success, or a terminal error message.
    async fn execute(&self, scan: &Scan) -> Result<i32, String> {
        let level = WcagLevel::parse(&scan.wcag_level).map_err(|e| e.to_string())?;

        let outcome = self
            .engine
            .scan(&scan.url, level)
            .await
            .map_err(|e| e.to_string())?;

        let result = NewScanResult {
            counts: outcome.counts(),
            inapplicable_checks: outcome.inapplicable,
            issues: serde_json::to_value(&outcome.issues)
                .map_err(|e| format!("issue serialization failed: {e}"))?,
            page_title: outcome.page_title.clone(),
        };
        ScanResultRepo::insert(&self.pool, scan.id, &result)
            .await
            .map_err(|e| format!("result persistence failed: {e}"))?;

        Ok(outcome.duration_ms)
    }

    /// A failed scan never reaches AI processing: fail the sub-machine and
    /// hand the reserved slot back to the campaign.
    async fn abandon_ai_reservation(&self, scan: &Scan) {
        if !scan.ai_enabled {
            return;
        }
        match ScanRepo::mark_ai_failed(&self.pool, scan.id).await {
            Ok(true) => {
                if let Some(campaign_id) = scan.campaign_id {
                    if let Err(e) = CampaignRepo::release_slot(&self.pool, campaign_id).await {
                        tracing::error!(
                            scan_id = scan.id,
                            campaign_id,
                            error = %e,
                            "Failed to release AI slot"
                        );
                    }
                }
            }
            Ok(false) => {} // sub-machine already terminal, nothing reserved
            Err(e) => {
                tracing::error!(scan_id = scan.id, error = %e, "Failed to fail AI sub-status");
            }
        }
    }

    fn publish_terminal_event(&self, scan: &Scan, terminal: ScanStatus) {
        let event_type = match terminal {
            ScanStatus::Failed => EVENT_SCAN_FAILED,
            _ => EVENT_SCAN_COMPLETED,
        };
        self.bus.publish(
            PlatformEvent::new(event_type)
                .with_source("scan", scan.id)
                .with_payload(serde_json::json!({ "url": scan.url })),
        );
    }

    /// Exactly one terminal notification per scan reaches the aggregator.
    ///
    /// A failure here is non-fatal: the recount design self-heals when any
    /// later member scan terminates, and the staleness sweep catches
    /// batches whose final notification was lost.
    async fn notify_aggregator(&self, scan: &Scan, terminal: ScanStatus) {
        if scan.batch_id.is_none() {
            return;
        }
        if let Err(e) =
            BatchAggregator::notify_scan_complete(&self.pool, &self.bus, scan.id, terminal).await
        {
            tracing::error!(
                scan_id = scan.id,
                batch_id = scan.batch_id,
                error = %e,
                "Batch aggregation notification failed"
            );
        }
    }
}
