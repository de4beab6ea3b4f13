//! Repository for the `campaigns` table: the AI token quota ledger.
//!
//! Admission control must hold under concurrent callers: two requests racing
//! on the last slot must never both be granted. Every ledger mutation here
//! is a single conditional UPDATE, so PostgreSQL's row lock serializes
//! writers per campaign and the budget guard is evaluated under the lock.

use chrono::Utc;
use sqlx::PgPool;

use accesspulse_core::error::CoreError;
use accesspulse_core::quota::{CampaignMetrics, DenialReason, SlotReservation};
use accesspulse_core::status::CampaignStatus;
use accesspulse_core::types::DbId;

use crate::models::campaign::{Campaign, CreateCampaign, UpdateCampaign};
use crate::retry;

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, name, total_token_budget, used_tokens, reserved_slots, \
    avg_tokens_per_scan, status_id, starts_at, ends_at, created_at, updated_at";

/// Map a ledger query failure to the domain taxonomy.
///
/// Conflicts reaching this point have already exhausted the bounded retry.
/// A check-constraint violation (SQLSTATE 23514) means a deduction tried to
/// push `used_tokens` past the budget; that is a caller bug, not a crash.
fn ledger_err(err: sqlx::Error) -> CoreError {
    if retry::is_retryable_conflict(&err) {
        return CoreError::Conflict(
            "Reservation failed: campaign ledger write conflicted after retries".to_string(),
        );
    }
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23514") {
            return CoreError::InvalidState(
                "Token deduction would exceed the campaign budget".to_string(),
            );
        }
    }
    CoreError::Internal(format!("Campaign ledger query failed: {err}"))
}

/// Provides the atomic ledger operations and CRUD for AI campaigns.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Insert a new campaign in ACTIVE status, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns \
                (name, total_token_budget, avg_tokens_per_scan, status_id, starts_at, ends_at) \
             VALUES ($1, $2, $3, $4, COALESCE($5, NOW()), $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(&input.name)
            .bind(input.total_token_budget)
            .bind(input.avg_tokens_per_scan)
            .bind(CampaignStatus::Active.id())
            .bind(input.starts_at)
            .bind(input.ends_at)
            .fetch_one(pool)
            .await
    }

    /// Find a campaign by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The campaign currently admitting AI scans, if any.
    ///
    /// "None" is a valid state: AI features are simply unavailable for new
    /// scans until an administrator starts a campaign.
    pub async fn find_active(pool: &PgPool) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaigns \
             WHERE status_id = $1 \
               AND starts_at <= NOW() \
               AND (ends_at IS NULL OR ends_at > NOW()) \
             ORDER BY starts_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(CampaignStatus::Active.id())
            .fetch_optional(pool)
            .await
    }

    /// List all campaigns, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns ORDER BY created_at DESC");
        sqlx::query_as::<_, Campaign>(&query).fetch_all(pool).await
    }

    /// Atomically check remaining budget and reserve one slot.
    ///
    /// The guard `total - used - reserved * avg >= avg` and the increment
    /// execute in one statement, so concurrent callers on the same campaign
    /// serialize on the row lock and can never jointly overshoot the budget.
    ///
    /// Returns `Granted`, or `Denied` with the reason the guard failed.
    /// A missing campaign is `NOT_FOUND` (non-retryable).
    pub async fn reserve_slot(pool: &PgPool, id: DbId) -> Result<SlotReservation, CoreError> {
        let affected = retry::with_conflict_retry(|| async {
            let result = sqlx::query(
                "UPDATE campaigns \
                 SET reserved_slots = reserved_slots + 1, updated_at = NOW() \
                 WHERE id = $1 \
                   AND status_id = $2 \
                   AND starts_at <= NOW() \
                   AND (ends_at IS NULL OR ends_at > NOW()) \
                   AND total_token_budget - used_tokens \
                       - reserved_slots::BIGINT * avg_tokens_per_scan \
                       >= avg_tokens_per_scan",
            )
            .bind(id)
            .bind(CampaignStatus::Active.id())
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
        .map_err(ledger_err)?;

        if affected > 0 {
            return Ok(SlotReservation::Granted);
        }

        // The guard failed; look at the row to name the reason.
        let campaign = Self::find_by_id(pool, id)
            .await
            .map_err(ledger_err)?
            .ok_or(CoreError::NotFound {
                entity: "Campaign",
                id,
            })?;

        let reason = if campaign.is_active_at(Utc::now()) {
            DenialReason::BudgetExhausted
        } else {
            DenialReason::CampaignInactive
        };
        Ok(SlotReservation::Denied(reason))
    }

    /// Return a reserved slot that will never be debited (the scan failed
    /// before AI processing, or the reservation was abandoned).
    ///
    /// Floored at zero: releasing more slots than are reserved is harmless.
    pub async fn release_slot(pool: &PgPool, id: DbId) -> Result<(), CoreError> {
        let affected = retry::with_conflict_retry(|| async {
            let result = sqlx::query(
                "UPDATE campaigns \
                 SET reserved_slots = GREATEST(reserved_slots - 1, 0), updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(id)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
        .map_err(ledger_err)?;

        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "Campaign",
                id,
            });
        }
        Ok(())
    }

    /// Commit the real token cost of a finished AI scan and retire its
    /// reservation in one statement.
    ///
    /// A concurrent `reserve_slot` can never observe the slot retired
    /// without the tokens added (or vice versa): both mutations land in the
    /// same row version. When the remaining budget drops below one expected
    /// scan cost, the campaign flips to EXHAUSTED in the same statement.
    pub async fn deduct_tokens(
        pool: &PgPool,
        id: DbId,
        actual_tokens: i64,
    ) -> Result<(), CoreError> {
        let affected = retry::with_conflict_retry(|| async {
            let result = sqlx::query(
                "UPDATE campaigns \
                 SET used_tokens = used_tokens + $2, \
                     reserved_slots = GREATEST(reserved_slots - 1, 0), \
                     status_id = CASE \
                         WHEN status_id = $3 \
                              AND total_token_budget - (used_tokens + $2) < avg_tokens_per_scan \
                         THEN $4 \
                         ELSE status_id \
                     END, \
                     updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(actual_tokens)
            .bind(CampaignStatus::Active.id())
            .bind(CampaignStatus::Exhausted.id())
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
        .map_err(ledger_err)?;

        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "Campaign",
                id,
            });
        }
        Ok(())
    }

    /// Read-only ledger metrics from one consistent snapshot read.
    pub async fn metrics(pool: &PgPool, id: DbId) -> Result<CampaignMetrics, CoreError> {
        let campaign = Self::find_by_id(pool, id)
            .await
            .map_err(ledger_err)?
            .ok_or(CoreError::NotFound {
                entity: "Campaign",
                id,
            })?;
        Ok(CampaignMetrics::from_snapshot(campaign.id, &campaign.snapshot()))
    }

    /// Adjust the cost estimate and/or window end.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!(
            "UPDATE campaigns \
             SET avg_tokens_per_scan = COALESCE($2, avg_tokens_per_scan), \
                 ends_at = COALESCE($3, ends_at), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .bind(input.avg_tokens_per_scan)
            .bind(input.ends_at)
            .fetch_optional(pool)
            .await
    }

    /// Pause an ACTIVE campaign. Returns `false` if it was not ACTIVE.
    pub async fn pause(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::set_status(pool, id, CampaignStatus::Active, CampaignStatus::Paused).await
    }

    /// Resume a PAUSED campaign. Returns `false` if it was not PAUSED.
    pub async fn resume(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::set_status(pool, id, CampaignStatus::Paused, CampaignStatus::Active).await
    }

    /// Guarded status flip: only `from` → `to`.
    async fn set_status(
        pool: &PgPool,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(from.id())
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sweep campaigns whose window has closed into ENDED.
    ///
    /// Returns the number of campaigns ended.
    pub async fn end_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET status_id = $1, updated_at = NOW() \
             WHERE status_id <> $1 AND ends_at IS NOT NULL AND ends_at <= NOW()",
        )
        .bind(CampaignStatus::Ended.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
