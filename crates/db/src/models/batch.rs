//! Batch entity models and DTOs.

use accesspulse_core::status::StatusId;
use accesspulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `batch_scans` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BatchScan {
    pub id: DbId,
    pub root_url: String,
    pub total_urls: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub status_id: StatusId,
    pub total_issues: i64,
    pub critical_count: i64,
    pub serious_count: i64,
    pub moderate_count: i64,
    pub minor_count: i64,
    pub passed_checks: i64,
    pub urls_scanned: i32,
    /// Nullified after the completion notification is delivered.
    pub email: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub last_activity_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a batch via `POST /api/v1/batches`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitBatch {
    #[validate(url)]
    pub root_url: String,
    /// Pages discovered under the root, one scan each.
    #[validate(length(min = 1, max = 500))]
    pub urls: Vec<String>,
    /// Defaults to "AA"; applies to every member scan.
    pub wcag_level: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// Query parameters for `GET /api/v1/batches`.
#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub status_id: Option<StatusId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
