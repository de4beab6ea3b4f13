//! Scan result entity models.

use accesspulse_core::types::{DbId, Timestamp};
use accesspulse_core::wcag::IssueCounts;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `scan_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanResult {
    pub id: DbId,
    pub scan_id: DbId,
    pub total_issues: i32,
    pub critical_count: i32,
    pub serious_count: i32,
    pub moderate_count: i32,
    pub minor_count: i32,
    pub passed_checks: i32,
    pub inapplicable_checks: i32,
    pub issues: serde_json::Value,
    pub page_title: Option<String>,
    pub created_at: Timestamp,
}

impl ScanResult {
    /// The counters the batch aggregation sums over.
    pub fn counts(&self) -> IssueCounts {
        IssueCounts {
            total_issues: self.total_issues,
            critical_count: self.critical_count,
            serious_count: self.serious_count,
            moderate_count: self.moderate_count,
            minor_count: self.minor_count,
            passed_checks: self.passed_checks,
        }
    }
}

/// Insert arguments for a scan's result row.
#[derive(Debug, Clone)]
pub struct NewScanResult {
    pub counts: IssueCounts,
    pub inapplicable_checks: i32,
    pub issues: serde_json::Value,
    pub page_title: Option<String>,
}
