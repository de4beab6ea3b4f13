//! Route definitions for batches.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Routes mounted at `/batches`.
///
/// ```text
/// POST /                 -> submit_batch
/// GET  /                 -> list_batches
/// GET  /{id}             -> get_batch
/// GET  /{id}/aggregate   -> get_batch_aggregate
/// POST /{id}/cancel      -> cancel_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(batches::submit_batch).get(batches::list_batches))
        .route("/{id}", get(batches::get_batch))
        .route("/{id}/aggregate", get(batches::get_batch_aggregate))
        .route("/{id}/cancel", post(batches::cancel_batch))
}
