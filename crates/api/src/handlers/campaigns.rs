//! Handlers for AI campaign administration.
//!
//! Campaigns are owned by the admin surface: scans only ever hold a
//! reference. The ledger counters themselves are mutated by the reservation
//! protocol, never directly through these endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use accesspulse_core::error::CoreError;
use accesspulse_core::types::DbId;
use accesspulse_db::models::campaign::{CreateCampaign, UpdateCampaign};
use accesspulse_db::repositories::CampaignRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/campaigns
///
/// Create a campaign. The token budget is fixed from here on.
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(input): Json<CreateCampaign>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let campaign = CampaignRepo::create(&state.pool, &input).await?;

    tracing::info!(
        campaign_id = campaign.id,
        budget = campaign.total_token_budget,
        avg_tokens_per_scan = campaign.avg_tokens_per_scan,
        "Campaign created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: campaign })))
}

/// GET /api/v1/admin/campaigns
pub async fn list_campaigns(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let campaigns = CampaignRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: campaigns }))
}

/// GET /api/v1/admin/campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let campaign = CampaignRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Campaign",
            id,
        }))?;
    Ok(Json(DataResponse { data: campaign }))
}

/// GET /api/v1/admin/campaigns/{id}/metrics
///
/// Ledger metrics from one consistent snapshot read.
pub async fn campaign_metrics(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let metrics = CampaignRepo::metrics(&state.pool, id).await?;
    Ok(Json(DataResponse { data: metrics }))
}

/// PUT /api/v1/admin/campaigns/{id}
///
/// Adjust the per-scan cost estimate and/or the window end.
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCampaign>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let campaign = CampaignRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Campaign",
            id,
        }))?;
    Ok(Json(DataResponse { data: campaign }))
}

/// POST /api/v1/admin/campaigns/{id}/pause
pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let paused = CampaignRepo::pause(&state.pool, id).await?;
    if !paused {
        return Err(AppError::Core(CoreError::InvalidState(format!(
            "Campaign {id} is not active and cannot be paused"
        ))));
    }
    tracing::info!(campaign_id = id, "Campaign paused");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/campaigns/{id}/resume
pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let resumed = CampaignRepo::resume(&state.pool, id).await?;
    if !resumed {
        return Err(AppError::Core(CoreError::InvalidState(format!(
            "Campaign {id} is not paused and cannot be resumed"
        ))));
    }
    tracing::info!(campaign_id = id, "Campaign resumed");
    Ok(StatusCode::NO_CONTENT)
}
