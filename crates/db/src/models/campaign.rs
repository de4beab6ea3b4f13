//! Campaign entity models and DTOs for the AI token ledger.

use accesspulse_core::quota::BudgetSnapshot;
use accesspulse_core::status::{CampaignStatus, StatusId};
use accesspulse_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `campaigns` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub name: String,
    pub total_token_budget: i64,
    pub used_tokens: i64,
    pub reserved_slots: i32,
    pub avg_tokens_per_scan: i64,
    pub status_id: StatusId,
    pub starts_at: Timestamp,
    pub ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Campaign {
    /// Ledger counters as a pure snapshot for budget arithmetic.
    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            total_token_budget: self.total_token_budget,
            used_tokens: self.used_tokens,
            reserved_slots: self.reserved_slots,
            avg_tokens_per_scan: self.avg_tokens_per_scan,
        }
    }

    /// Whether the campaign admits new AI scans at `now`: status ACTIVE and
    /// inside the `[starts_at, ends_at]` window (`ends_at` null = open).
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.status_id == CampaignStatus::Active.id()
            && self.starts_at <= now
            && self.ends_at.map(|end| end > now).unwrap_or(true)
    }
}

/// DTO for creating a campaign via `POST /api/v1/admin/campaigns`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaign {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1))]
    pub total_token_budget: i64,
    #[validate(range(min = 1))]
    pub avg_tokens_per_scan: i64,
    /// Defaults to NOW() when omitted.
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
}

/// DTO for updating a campaign via `PUT /api/v1/admin/campaigns/{id}`.
///
/// The token budget is fixed at creation; only the cost estimate and the
/// end of the window can be adjusted.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCampaign {
    #[validate(range(min = 1))]
    pub avg_tokens_per_scan: Option<i64>,
    pub ends_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn campaign(status: CampaignStatus, ends_at: Option<Timestamp>) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: 1,
            name: "launch".into(),
            total_token_budget: 1000,
            used_tokens: 0,
            reserved_slots: 0,
            avg_tokens_per_scan: 100,
            status_id: status.id(),
            starts_at: now - Duration::hours(1),
            ends_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_within_open_ended_window() {
        assert!(campaign(CampaignStatus::Active, None).is_active_at(Utc::now()));
    }

    #[test]
    fn inactive_when_paused_or_past_end() {
        let now = Utc::now();
        assert!(!campaign(CampaignStatus::Paused, None).is_active_at(now));
        assert!(!campaign(CampaignStatus::Active, Some(now - Duration::minutes(1)))
            .is_active_at(now));
    }
}
