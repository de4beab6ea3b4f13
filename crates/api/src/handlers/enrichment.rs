//! Handlers for the AI enrichment export/import pipeline.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use accesspulse_pipeline::{export_pending_scans, import_ai_results};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/enrichment/export
///
/// Atomically claims every AI-pending scan (flipping it to downloaded) and
/// returns the claimed set as a CSV document.
pub async fn export_csv(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let exported = export_pending_scans(&state.pool).await?;

    tracing::info!(rows = exported.row_count, "Enrichment export served");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"ai-pending-scans.csv\"".to_string(),
            ),
        ],
        exported.csv,
    ))
}

/// POST /api/v1/admin/enrichment/import
///
/// Consumes a CSV of AI results. Rows are validated independently; the
/// response always reports per-row outcomes (partial success is expected).
pub async fn import_csv(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let report = import_ai_results(&state.pool, &body).await?;
    Ok(Json(DataResponse { data: report }))
}
