//! Handlers for the `/batches` resource.
//!
//! A batch fans one submission out into many member scans created in a
//! single transaction. AI admission runs per member scan against the shared
//! campaign ledger; once the budget denies one member, the rest are created
//! without enrichment (the estimate is static, so further attempts would be
//! denied the same way).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use accesspulse_core::batch_aggregate::BatchAggregate;
use accesspulse_core::error::CoreError;
use accesspulse_core::quota::DenialReason;
use accesspulse_core::types::DbId;
use accesspulse_core::wcag::WcagLevel;
use accesspulse_db::models::batch::{BatchListQuery, BatchScan, SubmitBatch};
use accesspulse_db::models::scan::NewScan;
use accesspulse_db::repositories::BatchRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::scans::admit_ai_scan;
use crate::response::DataResponse;
use crate::state::AppState;

/// Default WCAG level when the request omits one.
const DEFAULT_WCAG_LEVEL: WcagLevel = WcagLevel::Aa;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for POST /batches, extending the base submission with an
/// optional AI request.
#[derive(Debug, Deserialize)]
pub struct SubmitBatchRequest {
    #[serde(flatten)]
    pub batch: SubmitBatch,
    pub ai_requested: Option<bool>,
}

/// Response for POST /batches.
#[derive(Debug, Serialize)]
pub struct SubmitBatchResponse {
    pub batch: BatchScan,
    /// Member scans granted an AI slot.
    pub ai_granted_count: usize,
    /// Why admission stopped, when it did.
    pub ai_denial_reason: Option<DenialReason>,
}

/// Response for GET /batches/{id}/aggregate: the stable statistics shape
/// consumed by the report renderers.
#[derive(Debug, Serialize)]
pub struct BatchAggregateResponse {
    pub batch_id: DbId,
    pub status_id: i16,
    pub completed_count: i32,
    pub failed_count: i32,
    #[serde(flatten)]
    pub aggregate: BatchAggregate,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/batches
///
/// Create a batch and all member scans in one transaction.
pub async fn submit_batch(
    State(state): State<AppState>,
    Json(input): Json<SubmitBatchRequest>,
) -> AppResult<impl IntoResponse> {
    input.batch.validate()?;
    let level = match &input.batch.wcag_level {
        Some(raw) => WcagLevel::parse(raw).map_err(AppError::Core)?,
        None => DEFAULT_WCAG_LEVEL,
    };

    let ai_requested = input.ai_requested.unwrap_or(false);
    let mut ai_granted_count = 0;
    let mut ai_denial_reason = None;

    let mut scans = Vec::with_capacity(input.batch.urls.len());
    for url in &input.batch.urls {
        let (ai_enabled, campaign_id) = if ai_requested && ai_denial_reason.is_none() {
            let (granted, reason, campaign_id) = admit_ai_scan(&state).await?;
            if granted {
                ai_granted_count += 1;
            } else {
                ai_denial_reason = reason;
            }
            (granted, campaign_id)
        } else {
            (false, None)
        };

        scans.push(NewScan {
            url: url.clone(),
            wcag_level: level.as_str().to_string(),
            // Members carry no address of their own; the batch holds it.
            email: None,
            batch_id: None, // filled in by the repository
            ai_enabled,
            campaign_id,
        });
    }

    let batch = BatchRepo::create_with_scans(
        &state.pool,
        &input.batch.root_url,
        input.batch.email.as_deref(),
        &scans,
    )
    .await?;

    tracing::info!(
        batch_id = batch.id,
        root_url = %batch.root_url,
        total_urls = batch.total_urls,
        ai_granted_count,
        "Batch submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmitBatchResponse {
                batch,
                ai_granted_count,
                ai_denial_reason,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/batches
pub async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<BatchListQuery>,
) -> AppResult<impl IntoResponse> {
    let batches = BatchRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: batches }))
}

/// GET /api/v1/batches/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = find_batch(&state, batch_id).await?;
    Ok(Json(DataResponse { data: batch }))
}

/// GET /api/v1/batches/{id}/aggregate
///
/// The aggregate-statistics shape for report renderers (PDF/CSV).
pub async fn get_batch_aggregate(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = find_batch(&state, batch_id).await?;
    let response = BatchAggregateResponse {
        batch_id: batch.id,
        status_id: batch.status_id,
        completed_count: batch.completed_count,
        failed_count: batch.failed_count,
        aggregate: BatchAggregate {
            total_issues: batch.total_issues,
            critical_count: batch.critical_count,
            serious_count: batch.serious_count,
            moderate_count: batch.moderate_count,
            minor_count: batch.minor_count,
            passed_checks: batch.passed_checks,
            urls_scanned: batch.urls_scanned,
        },
    };
    Ok(Json(DataResponse { data: response }))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/batches/{id}/cancel
///
/// Authoritative cancellation. In-flight member scans run to their natural
/// terminal state, but their notifications become no-ops against the
/// cancelled batch. Returns 409 if the batch already closed.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    // Surface a 404 rather than a blanket 409 for unknown ids.
    find_batch(&state, batch_id).await?;

    let cancelled = BatchRepo::cancel(&state.pool, batch_id).await?;
    if !cancelled {
        return Err(AppError::Core(CoreError::InvalidState(format!(
            "Batch {batch_id} is already closed and cannot be cancelled"
        ))));
    }

    tracing::info!(batch_id, "Batch cancelled");
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch a batch or produce the standard 404.
async fn find_batch(state: &AppState, batch_id: DbId) -> AppResult<BatchScan> {
    BatchRepo::find_by_id(&state.pool, batch_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        }))
}
