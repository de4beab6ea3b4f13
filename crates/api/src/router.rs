//! Top-level router assembly.

use axum::routing::get;
use axum::Router;

use crate::routes;
use crate::state::AppState;

/// Build the full application router (without middleware layers; those are
/// applied by `main` where the configuration lives).
pub fn build() -> Router<AppState> {
    let api = Router::new()
        .nest("/scans", routes::scans::router())
        .nest("/batches", routes::batches::router())
        .nest("/queue", routes::queue::router())
        .nest("/admin/campaigns", routes::campaigns::router())
        .nest("/admin/enrichment", routes::enrichment::router());

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
}

/// GET /health — liveness probe.
async fn health() -> &'static str {
    "ok"
}
