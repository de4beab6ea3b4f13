//! Batch completion detection.
//!
//! Called once per terminal scan event. The aggregator recounts every scan
//! in the batch instead of incrementing counters from the event, which makes
//! it idempotent and self-healing against missed or duplicated
//! notifications. Closure is a guarded UPDATE: under the last-two-scans race
//! both callers may compute the same final aggregate, but only the caller
//! whose UPDATE changed the row publishes the completion event, so the
//! outbound notification is dispatched exactly once.

use accesspulse_core::batch_aggregate::{self, BatchProgress};
use accesspulse_core::error::CoreError;
use accesspulse_core::status::{BatchStatus, ScanStatus};
use accesspulse_core::types::DbId;
use accesspulse_db::repositories::{BatchRepo, ScanRepo, ScanResultRepo};
use accesspulse_db::DbPool;
use accesspulse_events::bus::{EVENT_BATCH_COMPLETED, EVENT_BATCH_FAILED};
use accesspulse_events::{EventBus, PlatformEvent};

/// What a terminal-scan notification did to the owning batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// The scan has no `batch_id`; nothing to aggregate.
    NotPartOfBatch,
    /// The batch already closed (completed, failed, or cancelled); the
    /// notification was a duplicate or arrived late and was ignored.
    AlreadyClosed,
    /// Some scans are still pending or running; progress was persisted.
    StillInProgress(BatchProgress),
    /// Every scan is terminal and this call closed the batch.
    Closed(BatchStatus),
    /// Every scan is terminal but a concurrent call closed the batch first;
    /// no second notification was dispatched.
    ClosedElsewhere(BatchStatus),
}

fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("batch aggregation query failed: {err}"))
}

/// Watches terminal scan events and resolves batch completion.
pub struct BatchAggregator;

impl BatchAggregator {
    /// Process one terminal scan notification.
    ///
    /// The caller must invoke this only after the scan's terminal status
    /// write has committed; the recount below reads committed state.
    pub async fn notify_scan_complete(
        pool: &DbPool,
        bus: &EventBus,
        scan_id: DbId,
        status: ScanStatus,
    ) -> Result<AggregationOutcome, CoreError> {
        let scan = ScanRepo::find_by_id(pool, scan_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: "Scan",
                id: scan_id,
            })?;

        let Some(batch_id) = scan.batch_id else {
            return Ok(AggregationOutcome::NotPartOfBatch);
        };

        let batch = BatchRepo::find_by_id(pool, batch_id)
            .await
            .map_err(db_err)?
            .ok_or(CoreError::NotFound {
                entity: "Batch",
                id: batch_id,
            })?;

        // Duplicate / late notifications against a closed batch are no-ops.
        // This also keeps cancelled batches closed for good.
        if BatchStatus::from_id(batch.status_id).is_some_and(|s| s.is_closed()) {
            tracing::debug!(batch_id, scan_id, "Batch already closed, ignoring notification");
            return Ok(AggregationOutcome::AlreadyClosed);
        }

        // Recount all member scans by current status.
        let status_ids = ScanRepo::status_ids_for_batch(pool, batch_id)
            .await
            .map_err(db_err)?;
        let progress = batch_aggregate::classify(&status_ids);

        if !progress.is_resolved() {
            BatchRepo::update_progress(pool, batch_id, &progress)
                .await
                .map_err(db_err)?;
            tracing::debug!(
                batch_id,
                scan_id,
                completed = progress.completed,
                failed = progress.failed,
                outstanding = progress.outstanding,
                "Batch still in progress"
            );
            return Ok(AggregationOutcome::StillInProgress(progress));
        }

        // Every member is terminal: sum results and close.
        let counts = ScanResultRepo::counts_for_completed(pool, batch_id)
            .await
            .map_err(db_err)?;
        let aggregate = batch_aggregate::sum_results(counts.iter());
        let final_status = progress.final_status();

        let closed_here = BatchRepo::close(pool, batch_id, final_status, &progress, &aggregate)
            .await
            .map_err(db_err)?;

        if !closed_here {
            // A concurrent notification won the guarded UPDATE; it owns the
            // completion dispatch.
            return Ok(AggregationOutcome::ClosedElsewhere(final_status));
        }

        tracing::info!(
            batch_id,
            status = ?final_status,
            completed = progress.completed,
            failed = progress.failed,
            total_issues = aggregate.total_issues,
            urls_scanned = aggregate.urls_scanned,
            "Batch closed (last terminal scan: {scan_id} {status:?})"
        );

        let event_type = match final_status {
            BatchStatus::Failed => EVENT_BATCH_FAILED,
            _ => EVENT_BATCH_COMPLETED,
        };
        bus.publish(
            PlatformEvent::new(event_type)
                .with_source("batch", batch_id)
                .with_payload(serde_json::json!({
                    "completed_count": progress.completed,
                    "failed_count": progress.failed,
                    "total_issues": aggregate.total_issues,
                    "urls_scanned": aggregate.urls_scanned,
                })),
        );

        Ok(AggregationOutcome::Closed(final_status))
    }
}
