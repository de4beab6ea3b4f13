//! Route definitions for campaign administration.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::campaigns;
use crate::state::AppState;

/// Admin routes mounted at `/admin/campaigns`.
///
/// ```text
/// POST /              -> create_campaign
/// GET  /              -> list_campaigns
/// GET  /{id}          -> get_campaign
/// PUT  /{id}          -> update_campaign
/// GET  /{id}/metrics  -> campaign_metrics
/// POST /{id}/pause    -> pause_campaign
/// POST /{id}/resume   -> resume_campaign
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route(
            "/{id}",
            get(campaigns::get_campaign).put(campaigns::update_campaign),
        )
        .route("/{id}/metrics", get(campaigns::campaign_metrics))
        .route("/{id}/pause", post(campaigns::pause_campaign))
        .route("/{id}/resume", post(campaigns::resume_campaign))
}
