//! Periodic sweep ending campaigns whose window has closed.
//!
//! `find_active` already filters by window, so an expired campaign stops
//! admitting immediately; this sweep makes the ENDED status durable for
//! dashboards and reporting. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use accesspulse_db::repositories::CampaignRepo;

/// How often the sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300); // 5 minutes

/// Run the campaign end sweep loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Campaign sweep started"
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Campaign sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match CampaignRepo::end_expired(&pool).await {
                    Ok(ended) if ended > 0 => {
                        tracing::info!(ended, "Campaign sweep: ended expired campaigns");
                    }
                    Ok(_) => {
                        tracing::debug!("Campaign sweep: nothing to end");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Campaign sweep failed");
                    }
                }
            }
        }
    }
}
