//! Scan entity models and DTOs.

use accesspulse_core::status::StatusId;
use accesspulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `scans` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scan {
    pub id: DbId,
    pub url: String,
    pub wcag_level: String,
    pub status_id: StatusId,
    pub batch_id: Option<DbId>,
    pub ai_enabled: bool,
    /// NULL unless `ai_enabled`.
    pub ai_status_id: Option<StatusId>,
    /// Set iff a campaign slot was reserved for this scan.
    pub campaign_id: Option<DbId>,
    pub duration_ms: Option<i32>,
    pub error_message: Option<String>,
    /// Nullified after the completion notification is delivered.
    pub email: Option<String>,
    pub ai_summary: Option<String>,
    pub ai_remediation_plan: Option<String>,
    pub ai_issues: Option<serde_json::Value>,
    pub ai_tokens_used: Option<i64>,
    pub ai_model: Option<String>,
    pub ai_processing_ms: Option<i32>,
    pub claimed_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for submitting a scan via `POST /api/v1/scans`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitScan {
    #[validate(url)]
    pub url: String,
    /// Defaults to "AA".
    pub wcag_level: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    /// Request AI enrichment; granted only while an active campaign has
    /// budget remaining.
    pub ai_requested: Option<bool>,
}

/// Internal insert arguments, composed by handlers after admission.
#[derive(Debug, Clone)]
pub struct NewScan {
    pub url: String,
    pub wcag_level: String,
    pub email: Option<String>,
    pub batch_id: Option<DbId>,
    pub ai_enabled: bool,
    pub campaign_id: Option<DbId>,
}

/// Query parameters for `GET /api/v1/scans`.
#[derive(Debug, Deserialize)]
pub struct ScanListQuery {
    /// Filter by status ID (e.g. 1 = pending, 4 = failed).
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

/// One row handed to the AI enrichment pipeline by the export step.
#[derive(Debug, Clone, FromRow)]
pub struct AiExportRow {
    pub scan_id: DbId,
    pub url: String,
    pub email: Option<String>,
    pub wcag_level: String,
    pub issues: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub page_title: Option<String>,
}

/// Parsed AI result fields applied by the import step.
#[derive(Debug, Clone)]
pub struct AiResult {
    pub ai_summary: String,
    pub ai_remediation_plan: String,
    pub ai_issues: Option<serde_json::Value>,
    pub ai_tokens_used: i64,
    pub ai_model: String,
    pub ai_processing_ms: i32,
}
