//! Batch completion detection and aggregate statistics.
//!
//! The aggregator recounts every scan in a batch on each terminal-scan
//! notification instead of trusting incremental counters, which makes the
//! whole pipeline idempotent against missed and duplicated events. The
//! pure classification and summation steps live here; the recount query
//! and the guarded terminal write live in `accesspulse-db`.

use serde::Serialize;

use crate::status::{BatchStatus, ScanStatus, StatusId};
use crate::wcag::IssueCounts;

/// Result of recounting a batch's scans by current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: i32,
    pub failed: i32,
    /// Scans still pending or running.
    pub outstanding: i32,
}

impl BatchProgress {
    /// The batch is resolved once no scan remains pending or running.
    pub fn is_resolved(&self) -> bool {
        self.outstanding == 0
    }

    /// Terminal batch status under the fail-loud policy: one failed member
    /// fails the whole batch even though partial results are retained.
    ///
    /// Only meaningful when [`is_resolved`](Self::is_resolved) is true.
    pub fn final_status(&self) -> BatchStatus {
        if self.failed > 0 {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        }
    }
}

/// Classify raw scan status IDs into completion buckets.
///
/// Unknown status IDs are counted as outstanding: a row we cannot classify
/// must never push a batch over the completion edge.
pub fn classify(status_ids: &[StatusId]) -> BatchProgress {
    let mut progress = BatchProgress {
        completed: 0,
        failed: 0,
        outstanding: 0,
    };
    for &id in status_ids {
        match ScanStatus::from_id(id) {
            Some(ScanStatus::Completed) => progress.completed += 1,
            Some(ScanStatus::Failed) => progress.failed += 1,
            _ => progress.outstanding += 1,
        }
    }
    progress
}

/// Aggregate statistics for a resolved batch.
///
/// Field names are a stable contract consumed by the report renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchAggregate {
    pub total_issues: i64,
    pub critical_count: i64,
    pub serious_count: i64,
    pub moderate_count: i64,
    pub minor_count: i64,
    pub passed_checks: i64,
    /// Number of completed scans that contributed a result.
    pub urls_scanned: i32,
}

/// Sum per-scan counters over the completed scans that produced a result.
///
/// Completed scans without a result row are excluded from the sums but still
/// count toward the batch's completed total upstream.
pub fn sum_results<'a>(results: impl IntoIterator<Item = &'a IssueCounts>) -> BatchAggregate {
    let mut aggregate = BatchAggregate::default();
    for counts in results {
        aggregate.total_issues += i64::from(counts.total_issues);
        aggregate.critical_count += i64::from(counts.critical_count);
        aggregate.serious_count += i64::from(counts.serious_count);
        aggregate.moderate_count += i64::from(counts.moderate_count);
        aggregate.minor_count += i64::from(counts.minor_count);
        aggregate.passed_checks += i64::from(counts.passed_checks);
        aggregate.urls_scanned += 1;
    }
    aggregate
}
