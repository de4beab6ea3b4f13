//! Campaign ledger integration tests: admission atomicity under
//! concurrency, deduction/retirement, and window handling.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use accesspulse_core::error::CoreError;
use accesspulse_core::quota::{DenialReason, SlotReservation};
use accesspulse_core::status::CampaignStatus;
use accesspulse_db::models::campaign::{Campaign, CreateCampaign};
use accesspulse_db::repositories::CampaignRepo;

async fn seed_campaign(pool: &PgPool, budget: i64, avg: i64) -> Campaign {
    CampaignRepo::create(
        pool,
        &CreateCampaign {
            name: "launch promo".to_string(),
            total_token_budget: budget,
            avg_tokens_per_scan: avg,
            starts_at: None,
            ends_at: None,
        },
    )
    .await
    .expect("campaign insert should succeed")
}

/// Budget sized for exactly 10 slots: 25 concurrent reservation attempts
/// grant exactly 10, deny the rest, and never overspend — regardless of
/// interleaving.
#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_reservations_never_overspend(pool: PgPool) {
    let campaign = seed_campaign(&pool, 1000, 100).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let pool = pool.clone();
        let id = campaign.id;
        handles.push(tokio::spawn(async move {
            CampaignRepo::reserve_slot(&pool, id).await
        }));
    }

    let mut granted = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.expect("task should not panic") {
            Ok(SlotReservation::Granted) => granted += 1,
            Ok(SlotReservation::Denied(DenialReason::BudgetExhausted)) => denied += 1,
            other => panic!("unexpected reservation outcome: {other:?}"),
        }
    }
    assert_eq!(granted, 10);
    assert_eq!(denied, 15);

    let row = CampaignRepo::find_by_id(&pool, campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.reserved_slots, 10);
    assert_eq!(row.used_tokens, 0);
    assert!(row.used_tokens <= row.total_token_budget);
}

/// The eleventh sequential reservation is denied with BUDGET_EXHAUSTED.
#[sqlx::test(migrations = "../../db/migrations")]
async fn eleventh_reservation_is_denied(pool: PgPool) {
    let campaign = seed_campaign(&pool, 1000, 100).await;

    for i in 0..10 {
        let outcome = CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();
        assert_matches!(outcome, SlotReservation::Granted, "reservation {i}");
    }
    let outcome = CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();
    assert_matches!(
        outcome,
        SlotReservation::Denied(DenialReason::BudgetExhausted)
    );
}

/// Deducting 85 actual tokens retires one reservation and frees one display
/// slot; remaining tokens reflect actual spend.
#[sqlx::test(migrations = "../../db/migrations")]
async fn deduction_commits_cost_and_retires_reservation(pool: PgPool) {
    let campaign = seed_campaign(&pool, 1000, 100).await;

    for _ in 0..10 {
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();
    }
    let before = CampaignRepo::metrics(&pool, campaign.id).await.unwrap();
    assert_eq!(before.remaining_tokens, 1000);
    assert_eq!(before.remaining_slots, 0);

    CampaignRepo::deduct_tokens(&pool, campaign.id, 85)
        .await
        .unwrap();

    let after = CampaignRepo::metrics(&pool, campaign.id).await.unwrap();
    assert_eq!(after.remaining_tokens, 915);
    assert_eq!(after.remaining_slots, before.remaining_slots + 1);

    let row = CampaignRepo::find_by_id(&pool, campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.used_tokens, 85);
    assert_eq!(row.reserved_slots, 9);
}

/// Releasing a slot floors at zero instead of going negative.
#[sqlx::test(migrations = "../../db/migrations")]
async fn release_floors_at_zero(pool: PgPool) {
    let campaign = seed_campaign(&pool, 1000, 100).await;

    CampaignRepo::release_slot(&pool, campaign.id).await.unwrap();
    let row = CampaignRepo::find_by_id(&pool, campaign.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.reserved_slots, 0);
}

/// A released slot re-opens admission on a fully-reserved campaign.
#[sqlx::test(migrations = "../../db/migrations")]
async fn release_reopens_admission(pool: PgPool) {
    let campaign = seed_campaign(&pool, 300, 100).await;

    for _ in 0..3 {
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();
    }
    assert_matches!(
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap(),
        SlotReservation::Denied(_)
    );

    CampaignRepo::release_slot(&pool, campaign.id).await.unwrap();
    assert_matches!(
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap(),
        SlotReservation::Granted
    );
}

/// Draining the budget flips the campaign to EXHAUSTED inside the deduction
/// statement itself.
#[sqlx::test(migrations = "../../db/migrations")]
async fn deduction_flips_to_exhausted_below_one_scan(pool: PgPool) {
    let campaign = seed_campaign(&pool, 300, 100).await;

    CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap();
    CampaignRepo::deduct_tokens(&pool, campaign.id, 250)
        .await
        .unwrap();

    let row = CampaignRepo::find_by_id(&pool, campaign.id)
        .await
        .unwrap()
        .unwrap();
    // 50 remaining < 100 avg.
    assert_eq!(row.status_id, CampaignStatus::Exhausted.id());

    // An exhausted campaign no longer admits.
    assert_matches!(
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap(),
        SlotReservation::Denied(DenialReason::CampaignInactive)
    );
}

/// Paused and expired campaigns deny with CampaignInactive; a missing
/// campaign is NOT_FOUND.
#[sqlx::test(migrations = "../../db/migrations")]
async fn inactive_campaigns_deny_and_missing_is_not_found(pool: PgPool) {
    let campaign = seed_campaign(&pool, 1000, 100).await;

    assert!(CampaignRepo::pause(&pool, campaign.id).await.unwrap());
    assert_matches!(
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap(),
        SlotReservation::Denied(DenialReason::CampaignInactive)
    );

    assert!(CampaignRepo::resume(&pool, campaign.id).await.unwrap());
    assert_matches!(
        CampaignRepo::reserve_slot(&pool, campaign.id).await.unwrap(),
        SlotReservation::Granted
    );

    let err = CampaignRepo::reserve_slot(&pool, 999_999).await.unwrap_err();
    assert_matches!(err, CoreError::NotFound { entity: "Campaign", .. });
}

/// `find_active` respects status and window; the sweep ends expired rows.
#[sqlx::test(migrations = "../../db/migrations")]
async fn active_lookup_and_expiry_sweep(pool: PgPool) {
    // No campaign at all: a valid "AI unavailable" state.
    assert!(CampaignRepo::find_active(&pool).await.unwrap().is_none());

    let expired = CampaignRepo::create(
        &pool,
        &CreateCampaign {
            name: "old promo".to_string(),
            total_token_budget: 500,
            avg_tokens_per_scan: 100,
            starts_at: Some(Utc::now() - Duration::days(30)),
            ends_at: Some(Utc::now() - Duration::days(1)),
        },
    )
    .await
    .unwrap();

    // Out of window: not active even though status is ACTIVE.
    assert!(CampaignRepo::find_active(&pool).await.unwrap().is_none());

    let current = seed_campaign(&pool, 1000, 100).await;
    let active = CampaignRepo::find_active(&pool).await.unwrap().unwrap();
    assert_eq!(active.id, current.id);

    let ended = CampaignRepo::end_expired(&pool).await.unwrap();
    assert_eq!(ended, 1);
    let row = CampaignRepo::find_by_id(&pool, expired.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status_id, CampaignStatus::Ended.id());
}
