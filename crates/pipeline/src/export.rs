//! Enrichment export: hand AI-pending scans to the batch AI pipeline.
//!
//! The export atomically flips every `ai_status = pending` scan to
//! `downloaded` (selection and update in one transaction, so a concurrent
//! export can never double-claim) and serializes the claimed rows as CSV.
//! Quoting follows RFC 4180: embedded quotes are doubled, null fields
//! become empty strings.

use accesspulse_core::error::CoreError;
use accesspulse_db::models::scan::AiExportRow;
use accesspulse_db::repositories::ScanRepo;
use accesspulse_db::DbPool;

/// CSV header row, in the order the AI pipeline expects.
const HEADERS: [&str; 7] = [
    "scan_id",
    "url",
    "email",
    "wcag_level",
    "issues_json",
    "created_at",
    "page_title",
];

/// Result of one export run.
#[derive(Debug)]
pub struct ExportedCsv {
    /// Number of scans claimed (and flipped to downloaded).
    pub row_count: usize,
    /// The serialized CSV document, header included.
    pub csv: String,
}

/// Claim all AI-pending scans and serialize them for the AI pipeline.
pub async fn export_pending_scans(pool: &DbPool) -> Result<ExportedCsv, CoreError> {
    let rows = ScanRepo::claim_pending_for_export(pool)
        .await
        .map_err(|e| CoreError::Internal(format!("enrichment export failed: {e}")))?;

    let csv = rows_to_csv(&rows)?;
    tracing::info!(rows = rows.len(), "Exported AI-pending scans");
    Ok(ExportedCsv {
        row_count: rows.len(),
        csv,
    })
}

/// Serialize claimed rows as CSV. Pure so escaping is testable in isolation.
fn rows_to_csv(rows: &[AiExportRow]) -> Result<String, CoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(HEADERS)
        .map_err(|e| CoreError::Internal(format!("CSV header write failed: {e}")))?;

    for row in rows {
        let issues_json = match &row.issues {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        writer
            .write_record([
                row.scan_id.to_string().as_str(),
                row.url.as_str(),
                row.email.as_deref().unwrap_or(""),
                row.wcag_level.as_str(),
                issues_json.as_str(),
                row.created_at.to_rfc3339().as_str(),
                row.page_title.as_deref().unwrap_or(""),
            ])
            .map_err(|e| CoreError::Internal(format!("CSV row write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::Internal(format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::Internal(format!("CSV not UTF-8: {e}")))
}
