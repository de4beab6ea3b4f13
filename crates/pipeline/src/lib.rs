//! Batch aggregation and the AI enrichment export/import pipeline.

pub mod aggregator;
pub mod export;
pub mod import;

pub use aggregator::{AggregationOutcome, BatchAggregator};
pub use export::{export_pending_scans, ExportedCsv};
pub use import::{import_ai_results, ImportReport, RowFailure};
