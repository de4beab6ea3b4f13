//! Handlers for queue statistics.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use accesspulse_db::repositories::ScanRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Fallback mean scan duration before any scan has completed.
const DEFAULT_AVG_DURATION_MS: f64 = 30_000.0;

/// Response for GET /queue.
#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub pending: i64,
    pub running: i64,
    pub avg_duration_ms: f64,
    /// Naive wait estimate: pending * average duration / active workers
    /// (assumes at least one worker).
    pub estimated_wait_secs: Option<i64>,
}

/// GET /api/v1/queue
///
/// Current queue state: pending/running counts and a wait estimate.
pub async fn get_queue_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let (pending, running) = ScanRepo::queue_counts(&state.pool).await?;
    let avg_duration_ms = ScanRepo::avg_duration_ms(&state.pool)
        .await?
        .unwrap_or(DEFAULT_AVG_DURATION_MS);

    let estimated_wait_secs = if pending > 0 {
        let workers = running.max(1) as f64;
        Some(((pending as f64 * avg_duration_ms) / workers / 1000.0) as i64)
    } else {
        None
    };

    Ok(Json(DataResponse {
        data: QueueStatsResponse {
            pending,
            running,
            avg_duration_ms,
            estimated_wait_secs,
        },
    }))
}
