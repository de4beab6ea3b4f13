//! End-to-end worker tests with a stubbed scan engine: claim, execute,
//! terminal write, slot release, and batch aggregation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use accesspulse_core::status::{AiStatus, BatchStatus, ScanStatus};
use accesspulse_core::wcag::WcagLevel;
use accesspulse_db::models::campaign::CreateCampaign;
use accesspulse_db::models::scan::NewScan;
use accesspulse_db::repositories::{BatchRepo, CampaignRepo, ScanRepo, ScanResultRepo};
use accesspulse_events::EventBus;
use accesspulse_scanner::{EngineError, RawIssue, ScanEngine, ScanOutcome};
use accesspulse_worker::ScanRunner;

/// Engine stub: URLs containing "broken" fail, everything else returns two
/// issues and a page title.
struct StubEngine;

#[async_trait]
impl ScanEngine for StubEngine {
    async fn scan(&self, url: &str, _level: WcagLevel) -> Result<ScanOutcome, EngineError> {
        if url.contains("broken") {
            return Err(EngineError::ScanFailed("page did not load".to_string()));
        }
        Ok(ScanOutcome {
            issues: vec![
                RawIssue {
                    rule_id: "image-alt".to_string(),
                    impact: "critical".to_string(),
                    description: "missing alt text".to_string(),
                    selector: Some("img.hero".to_string()),
                },
                RawIssue {
                    rule_id: "color-contrast".to_string(),
                    impact: "serious".to_string(),
                    description: "low contrast".to_string(),
                    selector: None,
                },
            ],
            passes: 20,
            inapplicable: 5,
            duration_ms: 400,
            page_title: Some("Stub Page".to_string()),
        })
    }
}

/// Drive the runner until every scan is terminal (or the deadline passes).
async fn run_until_drained(pool: &PgPool, bus: Arc<EventBus>) {
    let runner = Arc::new(ScanRunner::new(
        pool.clone(),
        Arc::new(StubEngine),
        bus,
    ));
    let cancel = CancellationToken::new();
    let handle = {
        let runner = Arc::clone(&runner);
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(cancel).await })
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let (pending, running) = ScanRepo::queue_counts(pool).await.unwrap();
        if pending == 0 && running == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "scans did not drain in time ({pending} pending, {running} running)"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    cancel.cancel();
    let _ = handle.await;
}

fn member(url: &str) -> NewScan {
    NewScan {
        url: url.to_string(),
        wcag_level: "AA".to_string(),
        email: None,
        batch_id: None,
        ai_enabled: false,
        campaign_id: None,
    }
}

/// A successful scan ends completed with a result row and duration.
#[sqlx::test(migrations = "../../db/migrations")]
async fn successful_scan_completes_with_result(pool: PgPool) {
    let scan = ScanRepo::create(&pool, &member("https://example.com"))
        .await
        .unwrap();

    run_until_drained(&pool, Arc::new(EventBus::default())).await;

    let row = ScanRepo::find_by_id(&pool, scan.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, ScanStatus::Completed.id());
    assert_eq!(row.duration_ms, Some(400));

    let result = ScanResultRepo::find_by_scan(&pool, scan.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.total_issues, 2);
    assert_eq!(result.critical_count, 1);
    assert_eq!(result.serious_count, 1);
    assert_eq!(result.passed_checks, 20);
    assert_eq!(result.page_title.as_deref(), Some("Stub Page"));
}

/// A failing scan ends failed with the engine's error recorded.
#[sqlx::test(migrations = "../../db/migrations")]
async fn failing_scan_records_error(pool: PgPool) {
    let scan = ScanRepo::create(&pool, &member("https://example.com/broken"))
        .await
        .unwrap();

    run_until_drained(&pool, Arc::new(EventBus::default())).await;

    let row = ScanRepo::find_by_id(&pool, scan.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, ScanStatus::Failed.id());
    assert!(row.error_message.as_deref().unwrap().contains("did not load"));
    assert!(ScanResultRepo::find_by_scan(&pool, scan.id)
        .await
        .unwrap()
        .is_none());
}

/// An AI-enabled scan that fails before the AI stage fails its sub-machine
/// and hands its reserved slot back to the campaign.
#[sqlx::test(migrations = "../../db/migrations")]
async fn failed_ai_scan_releases_its_slot(pool: PgPool) {
    let campaign = CampaignRepo::create(
        &pool,
        &CreateCampaign {
            name: "promo".to_string(),
            total_token_budget: 1000,
            avg_tokens_per_scan: 100,
            starts_at: None,
            ends_at: None,
        },
    )
    .await
    .unwrap();
    CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();

    let scan = ScanRepo::create(
        &pool,
        &NewScan {
            ai_enabled: true,
            campaign_id: Some(campaign.id),
            ..member("https://example.com/broken")
        },
    )
    .await
    .unwrap();

    run_until_drained(&pool, Arc::new(EventBus::default())).await;

    let row = ScanRepo::find_by_id(&pool, scan.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, ScanStatus::Failed.id());
    assert_eq!(row.ai_status_id, Some(AiStatus::Failed.id()));

    let campaign = CampaignRepo::find_by_id(&pool, campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.reserved_slots, 0);
    assert_eq!(campaign.used_tokens, 0);
}

/// Draining a mixed batch closes it fail-loud with aggregates from the
/// completed members only.
#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_drains_to_fail_loud_closure(pool: PgPool) {
    let scans = vec![
        member("https://example.com/a"),
        member("https://example.com/broken"),
        member("https://example.com/c"),
    ];
    let batch = BatchRepo::create_with_scans(&pool, "https://example.com", None, &scans)
        .await
        .unwrap();

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    run_until_drained(&pool, Arc::clone(&bus)).await;

    let row = BatchRepo::find_by_id(&pool, batch.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, BatchStatus::Failed.id());
    assert_eq!(row.completed_count, 2);
    assert_eq!(row.failed_count, 1);
    assert_eq!(row.urls_scanned, 2);
    assert_eq!(row.total_issues, 4);
    assert!(row.completed_at.is_some());

    // Per-scan terminal events plus exactly one batch closure event.
    let mut batch_events = 0;
    while let Ok(event) = events.try_recv() {
        if event.event_type.starts_with("batch.") {
            batch_events += 1;
        }
    }
    assert_eq!(batch_events, 1);
}
