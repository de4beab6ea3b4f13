//! Periodic background maintenance tasks.

pub mod campaign_sweep;
pub mod stale_batches;
