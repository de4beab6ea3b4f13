//! Enrichment import: consume AI results produced by the batch pipeline.
//!
//! Every row is validated independently — the scan must exist, have AI
//! enabled, and currently be in the `downloaded` sub-state. A bad row fails
//! alone and is reported; the rest of the import proceeds (partial success
//! is the expected shape, never all-or-nothing). Each successfully applied
//! row debits the real token cost against the scan's campaign.

use serde::{Deserialize, Serialize};

use accesspulse_core::error::CoreError;
use accesspulse_core::types::DbId;
use accesspulse_db::models::scan::AiResult;
use accesspulse_db::repositories::{CampaignRepo, ScanRepo};
use accesspulse_db::DbPool;

/// One CSV row from the AI pipeline.
#[derive(Debug, Deserialize)]
struct ImportRow {
    scan_id: DbId,
    ai_summary: String,
    ai_remediation_plan: String,
    /// Empty string means no structured issues were produced.
    #[serde(default)]
    ai_issues_json: String,
    tokens_used: i64,
    ai_model: String,
    /// Milliseconds spent in AI processing.
    processing_time: i32,
}

/// A row that could not be applied.
#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    /// 1-based CSV data row number (header excluded).
    pub row: usize,
    /// Scan the row named, when parseable.
    pub scan_id: Option<DbId>,
    pub reason: String,
}

/// Structured per-row outcome of an import run.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub processed: usize,
    pub failed: usize,
    pub failures: Vec<RowFailure>,
}

/// Apply a CSV document of AI results.
///
/// Returns the per-row report; only infrastructure failures (e.g. the
/// database being unreachable) surface as errors.
pub async fn import_ai_results(pool: &DbPool, csv_data: &[u8]) -> Result<ImportReport, CoreError> {
    let mut reader = csv::Reader::from_reader(csv_data);
    let mut report = ImportReport::default();

    for (idx, record) in reader.deserialize::<ImportRow>().enumerate() {
        let row_number = idx + 1;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                report.fail(row_number, None, format!("unparseable row: {e}"));
                continue;
            }
        };

        match apply_row(pool, &row).await {
            Ok(()) => report.processed += 1,
            Err(reason) => report.fail(row_number, Some(row.scan_id), reason),
        }
    }

    tracing::info!(
        processed = report.processed,
        failed = report.failed,
        "AI result import finished"
    );
    Ok(report)
}

impl ImportReport {
    fn fail(&mut self, row: usize, scan_id: Option<DbId>, reason: String) {
        tracing::warn!(row, scan_id, reason = %reason, "AI import row rejected");
        self.failed += 1;
        self.failures.push(RowFailure {
            row,
            scan_id,
            reason,
        });
    }
}

/// Validate and apply a single row. Returns the rejection reason on failure.
async fn apply_row(pool: &DbPool, row: &ImportRow) -> Result<(), String> {
    let scan = ScanRepo::find_by_id(pool, row.scan_id)
        .await
        .map_err(|e| format!("scan lookup failed: {e}"))?
        .ok_or_else(|| format!("scan {} not found", row.scan_id))?;

    if !scan.ai_enabled {
        return Err(format!("scan {} does not have AI enrichment enabled", row.scan_id));
    }
    if row.tokens_used < 0 {
        return Err(format!("negative tokens_used for scan {}", row.scan_id));
    }

    let ai_issues = if row.ai_issues_json.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str(&row.ai_issues_json)
                .map_err(|e| format!("invalid ai_issues_json: {e}"))?,
        )
    };

    let result = AiResult {
        ai_summary: row.ai_summary.clone(),
        ai_remediation_plan: row.ai_remediation_plan.clone(),
        ai_issues,
        ai_tokens_used: row.tokens_used,
        ai_model: row.ai_model.clone(),
        ai_processing_ms: row.processing_time,
    };

    // The downloaded-state requirement is enforced atomically by the
    // guarded UPDATE: any other sub-state leaves the row untouched.
    let applied = ScanRepo::apply_ai_result(pool, row.scan_id, &result)
        .await
        .map_err(|e| format!("result write failed: {e}"))?;
    if !applied {
        return Err(format!(
            "scan {} is not awaiting AI results (expected downloaded state)",
            row.scan_id
        ));
    }

    // The guard above makes this transition — and therefore this deduction —
    // happen at most once per scan.
    match scan.campaign_id {
        Some(campaign_id) => CampaignRepo::deduct_tokens(pool, campaign_id, row.tokens_used)
            .await
            .map_err(|e| format!("token deduction failed: {e}")),
        None => {
            tracing::warn!(
                scan_id = row.scan_id,
                "AI scan has no campaign reference, skipping token deduction"
            );
            Ok(())
        }
    }
}
