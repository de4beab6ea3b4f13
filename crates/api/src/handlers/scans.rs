//! Handlers for the `/scans` resource.
//!
//! Submission runs the AI admission protocol: when enrichment is requested,
//! the active campaign's ledger is consulted and a slot reserved atomically.
//! A denial is a normal business outcome carried in the response body, not
//! an error status.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use validator::Validate;

use accesspulse_core::error::CoreError;
use accesspulse_core::lifecycle;
use accesspulse_core::quota::{DenialReason, SlotReservation};
use accesspulse_core::status::AiStatus;
use accesspulse_core::types::DbId;
use accesspulse_core::wcag::WcagLevel;
use accesspulse_db::models::scan::{NewScan, Scan, ScanListQuery, SubmitScan};
use accesspulse_db::repositories::{CampaignRepo, ScanRepo};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default WCAG level when the request omits one.
const DEFAULT_WCAG_LEVEL: WcagLevel = WcagLevel::Aa;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Response for POST /scans: the created scan plus the AI admission outcome.
#[derive(Debug, Serialize)]
pub struct SubmitScanResponse {
    pub scan: Scan,
    /// Whether AI enrichment was requested by the caller.
    pub ai_requested: bool,
    /// Whether a campaign slot was reserved.
    pub ai_granted: bool,
    /// Why admission was denied, when it was.
    pub ai_denial_reason: Option<DenialReason>,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/scans
///
/// Create a pending scan. With `ai_requested`, consults the active campaign
/// and reserves a slot; without an active campaign or remaining budget the
/// scan is still created, just without enrichment.
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(input): Json<SubmitScan>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let level = match &input.wcag_level {
        Some(raw) => WcagLevel::parse(raw).map_err(AppError::Core)?,
        None => DEFAULT_WCAG_LEVEL,
    };

    let ai_requested = input.ai_requested.unwrap_or(false);
    let (ai_granted, ai_denial_reason, campaign_id) = if ai_requested {
        admit_ai_scan(&state).await?
    } else {
        (false, None, None)
    };

    let scan = ScanRepo::create(
        &state.pool,
        &NewScan {
            url: input.url.clone(),
            wcag_level: level.as_str().to_string(),
            email: input.email.clone(),
            batch_id: None,
            ai_enabled: ai_granted,
            campaign_id,
        },
    )
    .await?;

    tracing::info!(
        scan_id = scan.id,
        url = %scan.url,
        ai_requested,
        ai_granted,
        "Scan submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmitScanResponse {
                scan,
                ai_requested,
                ai_granted,
                ai_denial_reason,
            },
        }),
    ))
}

/// Run the slot reservation protocol against the active campaign.
///
/// Returns `(granted, denial_reason, campaign_id)`. No active campaign is a
/// valid "AI unavailable" state, reported as `CampaignInactive`.
pub(crate) async fn admit_ai_scan(
    state: &AppState,
) -> AppResult<(bool, Option<DenialReason>, Option<DbId>)> {
    let Some(campaign) = CampaignRepo::find_active(&state.pool).await? else {
        return Ok((false, Some(DenialReason::CampaignInactive), None));
    };

    match CampaignRepo::reserve_slot(&state.pool, campaign.id).await? {
        SlotReservation::Granted => Ok((true, None, Some(campaign.id))),
        SlotReservation::Denied(reason) => {
            tracing::debug!(campaign_id = campaign.id, ?reason, "AI admission denied");
            Ok((false, Some(reason), None))
        }
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/scans
pub async fn list_scans(
    State(state): State<AppState>,
    Query(params): Query<ScanListQuery>,
) -> AppResult<impl IntoResponse> {
    let scans = ScanRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: scans }))
}

/// GET /api/v1/scans/{id}
pub async fn get_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let scan = find_scan(&state, scan_id).await?;
    Ok(Json(DataResponse { data: scan }))
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// POST /api/v1/scans/{id}/retry
///
/// Administrative retry of a failed AI enrichment: resets the AI sub-status
/// to pending and clears the recorded error. Rejected (without a write) for
/// non-AI scans and for AI scans not currently failed.
pub async fn retry_scan(
    State(state): State<AppState>,
    Path(scan_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let scan = find_scan(&state, scan_id).await?;

    let ai_status = scan.ai_status_id.and_then(AiStatus::from_id);
    lifecycle::validate_ai_retry(scan_id, scan.ai_enabled, ai_status).map_err(AppError::Core)?;

    let reset = ScanRepo::retry_failed_ai(&state.pool, scan_id).await?;
    if !reset {
        // Validated state changed underneath us between read and write.
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Scan {scan_id} changed state during retry"
        ))));
    }

    tracing::info!(scan_id, "Failed AI scan reset to pending");
    let scan = find_scan(&state, scan_id).await?;
    Ok(Json(DataResponse { data: scan }))
}

/// Fetch a scan or produce the standard 404.
async fn find_scan(state: &AppState, scan_id: DbId) -> AppResult<Scan> {
    ScanRepo::find_by_id(&state.pool, scan_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Scan",
            id: scan_id,
        }))
}
