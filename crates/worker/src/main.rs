use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accesspulse_events::{EmailConfig, EmailDelivery, EventBus, EventPersistence, NotificationDispatcher};
use accesspulse_scanner::{HttpEngineConfig, HttpScanEngine};
use accesspulse_worker::{ScanRunner, DEFAULT_CONCURRENCY};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accesspulse_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = accesspulse_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    accesspulse_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection established");

    let engine = Arc::new(HttpScanEngine::new(HttpEngineConfig::from_env()));

    // Terminal states happen in this process, so the completion pipeline
    // (durable event capture + email dispatch) runs here too.
    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));

    let email = EmailConfig::from_env().map(EmailDelivery::new);
    if email.is_none() {
        tracing::warn!("SMTP not configured, completion emails disabled");
    }
    let dispatcher = NotificationDispatcher::new(pool.clone(), email);
    tokio::spawn(dispatcher.run(bus.subscribe(), cancel.clone()));

    let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CONCURRENCY);
    tracing::info!(concurrency, "Worker starting");

    let runner = Arc::new(ScanRunner::new(pool, engine, bus));
    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let runner = Arc::clone(&runner);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move { runner.run(cancel).await }));
    }

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("Worker stopped");
}
