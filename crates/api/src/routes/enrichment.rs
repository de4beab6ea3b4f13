//! Route definitions for the AI enrichment pipeline.

use axum::routing::post;
use axum::Router;

use crate::handlers::enrichment;
use crate::state::AppState;

/// Admin routes mounted at `/admin/enrichment`.
///
/// ```text
/// POST /export  -> export_csv
/// POST /import  -> import_csv
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export", post(enrichment::export_csv))
        .route("/import", post(enrichment::import_csv))
}
