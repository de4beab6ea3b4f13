//! Request handlers, one module per resource.

pub mod batches;
pub mod campaigns;
pub mod enrichment;
pub mod queue;
pub mod scans;
