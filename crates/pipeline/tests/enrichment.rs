//! Enrichment pipeline integration tests: the export/import round trip.

use sqlx::PgPool;

use accesspulse_core::status::AiStatus;
use accesspulse_db::models::campaign::CreateCampaign;
use accesspulse_db::models::scan::NewScan;
use accesspulse_db::repositories::{CampaignRepo, ScanRepo};
use accesspulse_pipeline::{export_pending_scans, import_ai_results};

async fn seed_ai_scans(pool: &PgPool, campaign_id: i64, count: usize) -> Vec<i64> {
    let mut ids = Vec::new();
    for i in 0..count {
        let scan = ScanRepo::create(
            pool,
            &NewScan {
                url: format!("https://example.com/page-{i}"),
                wcag_level: "AA".to_string(),
                email: Some(format!("owner-{i}@example.com")),
                batch_id: None,
                ai_enabled: true,
                campaign_id: Some(campaign_id),
            },
        )
        .await
        .unwrap();
        CampaignRepo::reserve_slot(pool, campaign_id).await.unwrap();
        ids.push(scan.id);
    }
    ids
}

async fn seed_campaign(pool: &PgPool) -> i64 {
    CampaignRepo::create(
        pool,
        &CreateCampaign {
            name: "enrichment".to_string(),
            total_token_budget: 10_000,
            avg_tokens_per_scan: 100,
            starts_at: None,
            ends_at: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn import_csv(rows: &[(i64, i64)]) -> Vec<u8> {
    let mut csv = String::from(
        "scan_id,ai_summary,ai_remediation_plan,ai_issues_json,tokens_used,ai_model,processing_time\n",
    );
    for (scan_id, tokens) in rows {
        csv.push_str(&format!(
            "{scan_id},\"Summary for {scan_id}\",\"Fix \"\"alt\"\" text\",,{tokens},claude-sonnet,750\n"
        ));
    }
    csv.into_bytes()
}

/// Three pending AI scans flip to downloaded atomically and export as
/// exactly three CSV data rows; a second export finds nothing.
#[sqlx::test(migrations = "../../db/migrations")]
async fn export_flips_all_pending_once(pool: PgPool) {
    let campaign_id = seed_campaign(&pool).await;
    let ids = seed_ai_scans(&pool, campaign_id, 3).await;

    let exported = export_pending_scans(&pool).await.unwrap();
    assert_eq!(exported.row_count, 3);
    // Header + 3 data rows.
    assert_eq!(exported.csv.lines().count(), 4);

    for id in &ids {
        let scan = ScanRepo::find_by_id(&pool, *id).await.unwrap().unwrap();
        assert_eq!(scan.ai_status_id, Some(AiStatus::Downloaded.id()));
    }

    let again = export_pending_scans(&pool).await.unwrap();
    assert_eq!(again.row_count, 0);
}

/// Import naming 2 of 3 exported scans (plus one unknown id) processes 2,
/// fails 1, deducts tokens only for the processed rows, and leaves the
/// third scan downloaded.
#[sqlx::test(migrations = "../../db/migrations")]
async fn import_is_per_row_with_partial_success(pool: PgPool) {
    let campaign_id = seed_campaign(&pool).await;
    let ids = seed_ai_scans(&pool, campaign_id, 3).await;
    export_pending_scans(&pool).await.unwrap();

    let report = import_ai_results(
        &pool,
        &import_csv(&[(ids[0], 120), (ids[1], 80), (999_999, 50)]),
    )
    .await
    .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scan_id, Some(999_999));
    assert!(report.failures[0].reason.contains("not found"));

    for (id, expected) in [
        (ids[0], AiStatus::Completed),
        (ids[1], AiStatus::Completed),
        (ids[2], AiStatus::Downloaded),
    ] {
        let scan = ScanRepo::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(scan.ai_status_id, Some(expected.id()), "scan {id}");
    }

    let processed = ScanRepo::find_by_id(&pool, ids[0]).await.unwrap().unwrap();
    assert_eq!(processed.ai_tokens_used, Some(120));
    assert_eq!(processed.ai_summary.as_deref(), Some(&*format!("Summary for {}", ids[0])));
    assert_eq!(processed.ai_remediation_plan.as_deref(), Some("Fix \"alt\" text"));

    // Tokens deducted only for the two processed rows; their reservations
    // retired, the third still held.
    let campaign = CampaignRepo::find_by_id(&pool, campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.used_tokens, 200);
    assert_eq!(campaign.reserved_slots, 1);
}

/// Rows for scans that are not in the downloaded state fail individually.
#[sqlx::test(migrations = "../../db/migrations")]
async fn import_rejects_wrong_sub_state(pool: PgPool) {
    let campaign_id = seed_campaign(&pool).await;
    let ids = seed_ai_scans(&pool, campaign_id, 1).await;

    // Still pending: never exported.
    let report = import_ai_results(&pool, &import_csv(&[(ids[0], 60)]))
        .await
        .unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
    assert!(report.failures[0].reason.contains("downloaded"));

    let scan = ScanRepo::find_by_id(&pool, ids[0]).await.unwrap().unwrap();
    assert_eq!(scan.ai_status_id, Some(AiStatus::Pending.id()));
    assert_eq!(scan.ai_tokens_used, None);

    // Importing the same row twice after export: second application finds
    // the scan already completed and fails alone.
    export_pending_scans(&pool).await.unwrap();
    let first = import_ai_results(&pool, &import_csv(&[(ids[0], 60)]))
        .await
        .unwrap();
    assert_eq!(first.processed, 1);

    let second = import_ai_results(&pool, &import_csv(&[(ids[0], 60)]))
        .await
        .unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.failed, 1);

    // The deduction happened exactly once.
    let campaign = CampaignRepo::find_by_id(&pool, campaign_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.used_tokens, 60);
}

/// Export escapes embedded quotes by doubling and writes empty strings for
/// null fields.
#[sqlx::test(migrations = "../../db/migrations")]
async fn export_escaping_round_trips(pool: PgPool) {
    let campaign_id = seed_campaign(&pool).await;
    ScanRepo::create(
        &pool,
        &NewScan {
            url: "https://example.com/a?q=\"quoted\"".to_string(),
            wcag_level: "AAA".to_string(),
            email: None,
            batch_id: None,
            ai_enabled: true,
            campaign_id: Some(campaign_id),
        },
    )
    .await
    .unwrap();

    let exported = export_pending_scans(&pool).await.unwrap();
    assert_eq!(exported.row_count, 1);
    let data_line = exported.csv.lines().nth(1).unwrap();
    assert!(data_line.contains(r#""https://example.com/a?q=""quoted""""#));
    // Null email serializes as an empty field.
    assert!(data_line.contains(",,AAA,"));
}
