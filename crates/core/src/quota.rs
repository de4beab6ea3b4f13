//! Budget arithmetic for the AI campaign ledger.
//!
//! A campaign holds a fixed token budget. Admitting an AI-enabled scan
//! provisionally commits `avg_tokens_per_scan` tokens (a "slot") until the
//! real cost is known and debited. All arithmetic here is pure; the atomic
//! read-modify-write lives in `accesspulse-db`'s `CampaignRepo`.

use serde::Serialize;

use crate::types::DbId;

/// Point-in-time view of a campaign's ledger counters.
#[derive(Debug, Clone, Copy)]
pub struct BudgetSnapshot {
    pub total_token_budget: i64,
    pub used_tokens: i64,
    pub reserved_slots: i32,
    pub avg_tokens_per_scan: i64,
}

impl BudgetSnapshot {
    /// Tokens already spent plus the expected cost of in-flight slots.
    pub fn committed_tokens(&self) -> i64 {
        self.used_tokens + i64::from(self.reserved_slots) * self.avg_tokens_per_scan
    }

    /// Tokens not yet spent (ignores reservations).
    pub fn remaining_tokens(&self) -> i64 {
        self.total_token_budget - self.used_tokens
    }

    /// Tokens neither spent nor provisionally committed.
    pub fn uncommitted_tokens(&self) -> i64 {
        self.total_token_budget - self.committed_tokens()
    }

    /// Whether one more scan can be admitted without risking overspend.
    ///
    /// Admission requires the uncommitted budget to cover a full expected
    /// scan cost, so N concurrent grants can never collectively exceed the
    /// budget even if every one of them debits exactly the estimate.
    pub fn can_admit(&self) -> bool {
        self.uncommitted_tokens() >= self.avg_tokens_per_scan
    }

    /// Display estimate of slots left, in units of whole scans.
    ///
    /// Derived entirely from `avg_tokens_per_scan`: total slots minus
    /// slots-worth of spend minus in-flight reservations. Because spend is
    /// divided by a static estimate, this drifts from token-exact reality
    /// when actual scan costs differ from the estimate; admission uses
    /// [`can_admit`](Self::can_admit), never this value.
    pub fn remaining_slots(&self) -> i64 {
        let total_slots = self.total_token_budget / self.avg_tokens_per_scan;
        let spent_slots = self.used_tokens / self.avg_tokens_per_scan;
        (total_slots - spent_slots - i64::from(self.reserved_slots)).max(0)
    }

    /// The exhaustion threshold: remaining budget no longer covers one scan.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_tokens() < self.avg_tokens_per_scan
    }

    /// Spent fraction of the budget, as a percentage in [0, 100].
    pub fn utilization_percent(&self) -> f64 {
        if self.total_token_budget == 0 {
            return 100.0;
        }
        (self.used_tokens as f64 / self.total_token_budget as f64) * 100.0
    }
}

/// Read-only ledger metrics reported to dashboards and admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignMetrics {
    pub campaign_id: DbId,
    pub remaining_tokens: i64,
    pub remaining_slots: i64,
    pub utilization_percent: f64,
}

impl CampaignMetrics {
    /// Derive metrics from a consistent snapshot read.
    pub fn from_snapshot(campaign_id: DbId, snapshot: &BudgetSnapshot) -> Self {
        Self {
            campaign_id,
            remaining_tokens: snapshot.remaining_tokens(),
            remaining_slots: snapshot.remaining_slots(),
            utilization_percent: snapshot.utilization_percent(),
        }
    }
}

/// Why a slot reservation was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// The uncommitted budget no longer covers one expected scan cost.
    BudgetExhausted,
    /// The campaign is paused, exhausted, ended, or outside its window.
    CampaignInactive,
}

/// Outcome of an admission attempt against a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotReservation {
    /// A slot was reserved; the caller owns it until release or deduction.
    Granted,
    /// No slot was reserved.
    Denied(DenialReason),
}

impl SlotReservation {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(used: i64, reserved: i32) -> BudgetSnapshot {
        BudgetSnapshot {
            total_token_budget: 1000,
            used_tokens: used,
            reserved_slots: reserved,
            avg_tokens_per_scan: 100,
        }
    }

    #[test]
    fn fresh_campaign_admits() {
        let s = snapshot(0, 0);
        assert!(s.can_admit());
        assert_eq!(s.remaining_slots(), 10);
        assert_eq!(s.remaining_tokens(), 1000);
    }

    #[test]
    fn reservations_count_against_admission() {
        // 9 slots in flight: one slot's worth of budget left.
        assert!(snapshot(0, 9).can_admit());
        // 10 slots in flight: fully committed.
        assert!(!snapshot(0, 10).can_admit());
    }

    #[test]
    fn exactly_k_slots_fit_the_budget() {
        // Budget 1000, avg 100: exactly 10 sequential admissions succeed,
        // the 11th is denied.
        let mut reserved = 0;
        let mut granted = 0;
        for _ in 0..11 {
            if snapshot(0, reserved).can_admit() {
                reserved += 1;
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert!(!snapshot(0, reserved).can_admit());
    }

    #[test]
    fn deduction_below_estimate_frees_budget() {
        // One of ten reservations settles at 85 actual tokens: the retired
        // slot leaves a 15-token surplus.
        let s = snapshot(85, 9);
        assert_eq!(s.remaining_tokens(), 915);
        assert_eq!(s.committed_tokens(), 985);
        assert!(!s.can_admit()); // 15 uncommitted < 100
        let s = snapshot(85, 8);
        assert!(s.can_admit()); // a released slot re-opens admission
    }

    #[test]
    fn retiring_a_cheap_reservation_frees_a_display_slot() {
        // Fully reserved: no slots left on the dashboard.
        assert_eq!(snapshot(0, 10).remaining_slots(), 0);
        // One reservation settles at 85 < 100: the retired slot shows up
        // again because 85 spent rounds to zero whole slots.
        assert_eq!(snapshot(85, 9).remaining_slots(), 1);
    }

    #[test]
    fn remaining_slots_drift_from_actual_costs() {
        // Spend exactly at the estimate keeps the display honest.
        assert_eq!(snapshot(300, 0).remaining_slots(), 7);
        // Cheap scans make the display optimistic relative to tokens; the
        // admission check stays token-exact regardless.
        let s = snapshot(950, 0);
        assert_eq!(s.remaining_slots(), 1);
        assert!(!s.can_admit());
    }

    #[test]
    fn exhaustion_threshold() {
        assert!(!snapshot(900, 0).is_exhausted()); // exactly one scan left
        assert!(snapshot(901, 0).is_exhausted());
        assert!(snapshot(1000, 0).is_exhausted());
    }

    #[test]
    fn utilization_percent_bounds() {
        assert_eq!(snapshot(0, 0).utilization_percent(), 0.0);
        assert_eq!(snapshot(500, 0).utilization_percent(), 50.0);
        assert_eq!(snapshot(1000, 0).utilization_percent(), 100.0);
    }

    #[test]
    fn metrics_from_snapshot() {
        let m = CampaignMetrics::from_snapshot(7, &snapshot(85, 9));
        assert_eq!(m.campaign_id, 7);
        assert_eq!(m.remaining_tokens, 915);
        assert_eq!(m.remaining_slots, 1);
        assert!((m.utilization_percent - 8.5).abs() < f64::EPSILON);
    }
}
