//! Repository for the `scans` table.
//!
//! Outer lifecycle: pending → running → {completed, failed}, claimed by
//! workers via `SELECT ... FOR UPDATE SKIP LOCKED` so a scan is never
//! dispatched twice. The AI sub-status columns are only touched for scans
//! with `ai_enabled = true`.

use sqlx::PgPool;

use accesspulse_core::status::{AiStatus, ScanStatus, StatusId};
use accesspulse_core::types::DbId;

use crate::models::scan::{AiExportRow, AiResult, NewScan, Scan, ScanListQuery};

/// Column list for `scans` queries.
const COLUMNS: &str = "\
    id, url, wcag_level, status_id, batch_id, ai_enabled, ai_status_id, \
    campaign_id, duration_ms, error_message, email, \
    ai_summary, ai_remediation_plan, ai_issues, ai_tokens_used, ai_model, \
    ai_processing_ms, claimed_at, started_at, completed_at, created_at, updated_at";

/// Maximum page size for scan listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for scan listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides lifecycle and CRUD operations for scans.
pub struct ScanRepo;

impl ScanRepo {
    /// Insert a new pending scan.
    ///
    /// For AI-enabled scans the sub-machine starts at `pending`.
    pub async fn create(pool: &PgPool, input: &NewScan) -> Result<Scan, sqlx::Error> {
        let query = format!(
            "INSERT INTO scans \
                (url, wcag_level, status_id, batch_id, ai_enabled, ai_status_id, campaign_id, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let ai_status_id = input.ai_enabled.then(|| AiStatus::Pending.id());
        sqlx::query_as::<_, Scan>(&query)
            .bind(&input.url)
            .bind(&input.wcag_level)
            .bind(ScanStatus::Pending.id())
            .bind(input.batch_id)
            .bind(input.ai_enabled)
            .bind(ai_status_id)
            .bind(input.campaign_id)
            .bind(&input.email)
            .fetch_one(pool)
            .await
    }

    /// Insert every scan of a batch inside the caller's transaction.
    pub async fn create_many(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        inputs: &[NewScan],
    ) -> Result<Vec<Scan>, sqlx::Error> {
        let query = format!(
            "INSERT INTO scans \
                (url, wcag_level, status_id, batch_id, ai_enabled, ai_status_id, campaign_id, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let mut scans = Vec::with_capacity(inputs.len());
        for input in inputs {
            let ai_status_id = input.ai_enabled.then(|| AiStatus::Pending.id());
            let scan = sqlx::query_as::<_, Scan>(&query)
                .bind(&input.url)
                .bind(&input.wcag_level)
                .bind(ScanStatus::Pending.id())
                .bind(input.batch_id)
                .bind(input.ai_enabled)
                .bind(ai_status_id)
                .bind(input.campaign_id)
                .bind(&input.email)
                .fetch_one(&mut **tx)
                .await?;
            scans.push(scan);
        }
        Ok(scans)
    }

    /// Atomically claim the oldest unclaimed pending scan for a worker.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// double-claim.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Scan>, sqlx::Error> {
        let query = format!(
            "UPDATE scans \
             SET status_id = $1, claimed_at = NOW(), started_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM scans \
                 WHERE status_id = $2 AND claimed_at IS NULL \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scan>(&query)
            .bind(ScanStatus::Running.id())
            .bind(ScanStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a running scan completed.
    pub async fn complete(
        pool: &PgPool,
        scan_id: DbId,
        duration_ms: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scans \
             SET status_id = $2, duration_ms = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(scan_id)
        .bind(ScanStatus::Completed.id())
        .bind(duration_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a scan failed with an error message.
    ///
    /// No automatic retry happens; for AI-enabled scans the administrative
    /// retry path goes through [`ScanRepo::retry_failed_ai`].
    pub async fn fail(
        pool: &PgPool,
        scan_id: DbId,
        error: &str,
        duration_ms: Option<i32>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE scans \
             SET status_id = $2, error_message = $3, duration_ms = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(scan_id)
        .bind(ScanStatus::Failed.id())
        .bind(error)
        .bind(duration_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Move a non-terminal AI sub-status to failed.
    ///
    /// Returns `true` if the sub-status changed. Used when a scan dies
    /// before reaching AI processing so the reservation can be released.
    pub async fn mark_ai_failed(pool: &PgPool, scan_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scans \
             SET ai_status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND ai_enabled AND ai_status_id NOT IN ($3, $2)",
        )
        .bind(scan_id)
        .bind(AiStatus::Failed.id())
        .bind(AiStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset a failed AI scan back to pending and clear its error.
    ///
    /// The guard repeats the domain validation so a racing status change
    /// cannot slip a non-failed scan through. Returns `true` on reset.
    pub async fn retry_failed_ai(pool: &PgPool, scan_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scans \
             SET ai_status_id = $2, error_message = NULL, updated_at = NOW() \
             WHERE id = $1 AND ai_enabled AND ai_status_id = $3",
        )
        .bind(scan_id)
        .bind(AiStatus::Pending.id())
        .bind(AiStatus::Failed.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Claim every AI-pending scan for enrichment export.
    ///
    /// Row selection and the pending → downloaded flip run inside one
    /// transaction: a concurrent export sees either none of these rows
    /// (already flipped) or blocks on the row locks, never a partial set.
    pub async fn claim_pending_for_export(pool: &PgPool) -> Result<Vec<AiExportRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let rows = sqlx::query_as::<_, AiExportRow>(
            "SELECT s.id AS scan_id, s.url, s.email, s.wcag_level, \
                    r.issues, s.created_at, r.page_title \
             FROM scans s \
             LEFT JOIN scan_results r ON r.scan_id = s.id \
             WHERE s.ai_enabled AND s.ai_status_id = $1 \
             ORDER BY s.created_at ASC \
             FOR UPDATE OF s SKIP LOCKED",
        )
        .bind(AiStatus::Pending.id())
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(rows);
        }

        let ids: Vec<DbId> = rows.iter().map(|r| r.scan_id).collect();
        sqlx::query(
            "UPDATE scans SET ai_status_id = $1, updated_at = NOW() WHERE id = ANY($2)",
        )
        .bind(AiStatus::Downloaded.id())
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows)
    }

    /// Apply imported AI results to a downloaded scan.
    ///
    /// The `ai_status_id = downloaded` guard makes the required sub-state
    /// check atomic with the write; any other status leaves the row
    /// untouched and returns `false` for per-row failure reporting.
    pub async fn apply_ai_result(
        pool: &PgPool,
        scan_id: DbId,
        result: &AiResult,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE scans \
             SET ai_summary = $2, ai_remediation_plan = $3, ai_issues = $4, \
                 ai_tokens_used = $5, ai_model = $6, ai_processing_ms = $7, \
                 ai_status_id = $8, updated_at = NOW() \
             WHERE id = $1 AND ai_enabled AND ai_status_id = $9",
        )
        .bind(scan_id)
        .bind(&result.ai_summary)
        .bind(&result.ai_remediation_plan)
        .bind(&result.ai_issues)
        .bind(result.ai_tokens_used)
        .bind(&result.ai_model)
        .bind(result.ai_processing_ms)
        .bind(AiStatus::Completed.id())
        .bind(AiStatus::Downloaded.id())
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Find a scan by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scan>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scans WHERE id = $1");
        sqlx::query_as::<_, Scan>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Current status of every scan in a batch, for the aggregator recount.
    pub async fn status_ids_for_batch(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<StatusId>, sqlx::Error> {
        sqlx::query_scalar("SELECT status_id FROM scans WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// List scans with optional status filter and pagination.
    pub async fn list(pool: &PgPool, params: &ScanListQuery) -> Result<Vec<Scan>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let filter = if params.status_id.is_some() {
            "WHERE status_id = $3"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM scans {filter} \
             ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2"
        );

        let mut q = sqlx::query_as::<_, Scan>(&query).bind(limit).bind(offset);
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        q.fetch_all(pool).await
    }

    /// Forget the notification recipient after delivery (privacy).
    pub async fn clear_email(pool: &PgPool, scan_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE scans SET email = NULL, updated_at = NOW() WHERE id = $1")
            .bind(scan_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Pending and running counts for the queue stats endpoint.
    pub async fn queue_counts(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT \
                COUNT(*) FILTER (WHERE status_id = $1), \
                COUNT(*) FILTER (WHERE status_id = $2) \
             FROM scans",
        )
        .bind(ScanStatus::Pending.id())
        .bind(ScanStatus::Running.id())
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Mean duration of completed scans, for wait estimation.
    pub async fn avg_duration_ms(pool: &PgPool) -> Result<Option<f64>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT AVG(duration_ms)::FLOAT8 FROM scans WHERE status_id = $1",
        )
        .bind(ScanStatus::Completed.id())
        .fetch_one(pool)
        .await
    }
}
