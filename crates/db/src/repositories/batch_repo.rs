//! Repository for the `batch_scans` table.
//!
//! The terminal write is a guarded UPDATE (`status IN (pending, running)`),
//! which makes batch closure idempotent: when two aggregator calls race on
//! the last two scans, both may compute the same final aggregate but only
//! one UPDATE changes the row — and only that caller dispatches the
//! completion notification.

use sqlx::PgPool;

use accesspulse_core::batch_aggregate::{BatchAggregate, BatchProgress};
use accesspulse_core::status::BatchStatus;
use accesspulse_core::types::{DbId, Timestamp};

use crate::models::batch::{BatchListQuery, BatchScan};
use crate::models::scan::NewScan;
use crate::repositories::ScanRepo;

/// Column list for `batch_scans` queries.
const COLUMNS: &str = "\
    id, root_url, total_urls, completed_count, failed_count, status_id, \
    total_issues, critical_count, serious_count, moderate_count, minor_count, \
    passed_checks, urls_scanned, email, completed_at, last_activity_at, \
    created_at, updated_at";

/// Maximum page size for batch listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for batch listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD and aggregation writes for scan batches.
pub struct BatchRepo;

impl BatchRepo {
    /// Create a batch and all of its member scans in one transaction.
    ///
    /// Scans carry `batch_id` back-references; the batch owns them for
    /// aggregation purposes.
    pub async fn create_with_scans(
        pool: &PgPool,
        root_url: &str,
        email: Option<&str>,
        scans: &[NewScan],
    ) -> Result<BatchScan, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO batch_scans (root_url, total_urls, status_id, email) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let batch = sqlx::query_as::<_, BatchScan>(&query)
            .bind(root_url)
            .bind(scans.len() as i32)
            .bind(BatchStatus::Pending.id())
            .bind(email)
            .fetch_one(&mut *tx)
            .await?;

        let members: Vec<NewScan> = scans
            .iter()
            .map(|s| NewScan {
                batch_id: Some(batch.id),
                ..s.clone()
            })
            .collect();
        ScanRepo::create_many(&mut tx, &members).await?;

        tx.commit().await?;
        Ok(batch)
    }

    /// Find a batch by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BatchScan>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM batch_scans WHERE id = $1");
        sqlx::query_as::<_, BatchScan>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List batches with optional status filter and pagination.
    pub async fn list(pool: &PgPool, params: &BatchListQuery) -> Result<Vec<BatchScan>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let filter = if params.status_id.is_some() {
            "WHERE status_id = $3"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM batch_scans {filter} \
             ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2"
        );

        let mut q = sqlx::query_as::<_, BatchScan>(&query).bind(limit).bind(offset);
        if let Some(sid) = params.status_id {
            q = q.bind(sid);
        }
        q.fetch_all(pool).await
    }

    /// Persist recounted progress on a still-open batch.
    ///
    /// Promotes pending → running and refreshes the activity stamp used by
    /// the staleness sweep. Closed batches are left untouched.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        progress: &BatchProgress,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE batch_scans \
             SET completed_count = $2, failed_count = $3, \
                 status_id = CASE WHEN status_id = $4 THEN $5 ELSE status_id END, \
                 last_activity_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(progress.completed)
        .bind(progress.failed)
        .bind(BatchStatus::Pending.id())
        .bind(BatchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Close a fully-resolved batch: final status, counts, aggregates, and
    /// the completion timestamp land in one guarded UPDATE.
    ///
    /// Returns `true` only for the caller whose UPDATE changed the row;
    /// that caller owns the one-and-only completion notification dispatch.
    pub async fn close(
        pool: &PgPool,
        id: DbId,
        final_status: BatchStatus,
        progress: &BatchProgress,
        aggregate: &BatchAggregate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batch_scans \
             SET status_id = $2, completed_count = $3, failed_count = $4, \
                 total_issues = $5, critical_count = $6, serious_count = $7, \
                 moderate_count = $8, minor_count = $9, passed_checks = $10, \
                 urls_scanned = $11, completed_at = NOW(), \
                 last_activity_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($12, $13)",
        )
        .bind(id)
        .bind(final_status.id())
        .bind(progress.completed)
        .bind(progress.failed)
        .bind(aggregate.total_issues)
        .bind(aggregate.critical_count)
        .bind(aggregate.serious_count)
        .bind(aggregate.moderate_count)
        .bind(aggregate.minor_count)
        .bind(aggregate.passed_checks)
        .bind(aggregate.urls_scanned)
        .bind(BatchStatus::Pending.id())
        .bind(BatchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a batch that has not yet closed.
    ///
    /// Authoritative and final: the aggregator's closed-status guard keeps
    /// late terminal-scan notifications from reopening it. Returns `false`
    /// if the batch was already closed or stale.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batch_scans \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(BatchStatus::Cancelled.id())
        .bind(BatchStatus::Pending.id())
        .bind(BatchStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sweep running batches with no scan activity since `cutoff` to STALE.
    ///
    /// Returns the number of batches marked.
    pub async fn mark_stale_since(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE batch_scans \
             SET status_id = $1, updated_at = NOW() \
             WHERE status_id = $2 AND last_activity_at < $3",
        )
        .bind(BatchStatus::Stale.id())
        .bind(BatchStatus::Running.id())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Forget the notification recipient after delivery (privacy).
    pub async fn clear_email(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE batch_scans SET email = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
