//! Domain error taxonomy shared across all AccessPulse crates.

use crate::types::DbId;

/// Domain-level errors produced by core logic and repositories.
///
/// The API layer maps each variant to a stable machine-readable code and
/// an HTTP status; see `accesspulse-api`'s `error` module.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist. Non-retryable.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Malformed or out-of-range input. User-correctable.
    #[error("{0}")]
    Validation(String),

    /// The operation is not valid for the entity's current status.
    /// Non-retryable, user-correctable.
    #[error("{0}")]
    InvalidState(String),

    /// An AI-only operation was invoked on a scan without AI enrichment.
    #[error("AI enrichment is not enabled for scan {0}")]
    AiNotEnabled(DbId),

    /// A write conflicted with a concurrent writer after internal retries
    /// were exhausted.
    #[error("{0}")]
    Conflict(String),

    /// Unexpected internal failure. Details are logged, not surfaced.
    #[error("{0}")]
    Internal(String),
}
