//! Repository for the `scan_results` table.

use sqlx::PgPool;

use accesspulse_core::status::ScanStatus;
use accesspulse_core::types::DbId;
use accesspulse_core::wcag::IssueCounts;

use crate::models::scan_result::{NewScanResult, ScanResult};

/// Column list for `scan_results` queries.
const COLUMNS: &str = "\
    id, scan_id, total_issues, critical_count, serious_count, moderate_count, \
    minor_count, passed_checks, inapplicable_checks, issues, page_title, created_at";

/// Issue counter row used by the batch aggregation sum.
#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    total_issues: i32,
    critical_count: i32,
    serious_count: i32,
    moderate_count: i32,
    minor_count: i32,
    passed_checks: i32,
}

impl From<CountsRow> for IssueCounts {
    fn from(row: CountsRow) -> Self {
        IssueCounts {
            total_issues: row.total_issues,
            critical_count: row.critical_count,
            serious_count: row.serious_count,
            moderate_count: row.moderate_count,
            minor_count: row.minor_count,
            passed_checks: row.passed_checks,
        }
    }
}

/// Provides CRUD operations for per-scan results.
pub struct ScanResultRepo;

impl ScanResultRepo {
    /// Insert the result row for a completed scan.
    pub async fn insert(
        pool: &PgPool,
        scan_id: DbId,
        input: &NewScanResult,
    ) -> Result<ScanResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO scan_results \
                (scan_id, total_issues, critical_count, serious_count, moderate_count, \
                 minor_count, passed_checks, inapplicable_checks, issues, page_title) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScanResult>(&query)
            .bind(scan_id)
            .bind(input.counts.total_issues)
            .bind(input.counts.critical_count)
            .bind(input.counts.serious_count)
            .bind(input.counts.moderate_count)
            .bind(input.counts.minor_count)
            .bind(input.counts.passed_checks)
            .bind(input.inapplicable_checks)
            .bind(&input.issues)
            .bind(&input.page_title)
            .fetch_one(pool)
            .await
    }

    /// Find the result row for a scan.
    pub async fn find_by_scan(
        pool: &PgPool,
        scan_id: DbId,
    ) -> Result<Option<ScanResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scan_results WHERE scan_id = $1");
        sqlx::query_as::<_, ScanResult>(&query)
            .bind(scan_id)
            .fetch_optional(pool)
            .await
    }

    /// Issue counters of every completed scan in a batch that produced a
    /// result. Completed scans without a result row are simply absent.
    pub async fn counts_for_completed(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<IssueCounts>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CountsRow>(
            "SELECT r.total_issues, r.critical_count, r.serious_count, \
                    r.moderate_count, r.minor_count, r.passed_checks \
             FROM scan_results r \
             JOIN scans s ON s.id = r.scan_id \
             WHERE s.batch_id = $1 AND s.status_id = $2",
        )
        .bind(batch_id)
        .bind(ScanStatus::Completed.id())
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(IssueCounts::from).collect())
    }
}
