//! Route definitions for scans.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::scans;
use crate::state::AppState;

/// Routes mounted at `/scans`.
///
/// ```text
/// POST /            -> submit_scan
/// GET  /            -> list_scans
/// GET  /{id}        -> get_scan
/// POST /{id}/retry  -> retry_scan
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(scans::submit_scan).get(scans::list_scans))
        .route("/{id}", get(scans::get_scan))
        .route("/{id}/retry", post(scans::retry_scan))
}
