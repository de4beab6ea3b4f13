//! Periodic sweep marking abandoned batches as stale.
//!
//! A running batch whose scans stopped producing terminal events (e.g. a
//! worker crash ate the final notifications) would otherwise sit in RUNNING
//! forever. Batches with no activity for the staleness window are moved to
//! STALE so dashboards can surface them for manual attention.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use accesspulse_db::repositories::BatchRepo;

/// Default staleness window: 6 hours without scan activity.
const DEFAULT_STALE_AFTER_HOURS: i64 = 6;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1800); // 30 minutes

/// Run the stale-batch sweep loop until `cancel` is triggered.
///
/// The window is read from `BATCH_STALE_AFTER_HOURS` (defaults to 6).
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let stale_after_hours: i64 = std::env::var("BATCH_STALE_AFTER_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_STALE_AFTER_HOURS);

    tracing::info!(
        stale_after_hours,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Stale batch sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale batch sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::hours(stale_after_hours);
                match BatchRepo::mark_stale_since(&pool, cutoff).await {
                    Ok(marked) if marked > 0 => {
                        tracing::warn!(marked, "Stale batch sweep: marked inactive batches");
                    }
                    Ok(_) => {
                        tracing::debug!("Stale batch sweep: nothing to mark");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stale batch sweep failed");
                    }
                }
            }
        }
    }
}
