//! Scan lifecycle transition rules.
//!
//! The outer scan machine is strictly one-directional:
//! Pending → Running → {Completed, Failed}. The AI sub-machine
//! (Pending → Downloaded → Processing → Completed, Failed from any
//! non-terminal state) only applies to scans with `ai_enabled = true`, and
//! only the administrative retry action leaves its Failed state.

use crate::error::CoreError;
use crate::status::{AiStatus, ScanStatus};
use crate::types::DbId;

/// Whether an outer scan status transition is legal.
pub fn scan_transition_allowed(from: ScanStatus, to: ScanStatus) -> bool {
    matches!(
        (from, to),
        (ScanStatus::Pending, ScanStatus::Running)
            | (ScanStatus::Running, ScanStatus::Completed)
            | (ScanStatus::Running, ScanStatus::Failed)
            // A scan can fail before a worker ever picks it up (e.g. the
            // batch submitter rejects the URL during fan-out).
            | (ScanStatus::Pending, ScanStatus::Failed)
    )
}

/// Whether an AI sub-status transition is legal.
pub fn ai_transition_allowed(from: AiStatus, to: AiStatus) -> bool {
    match (from, to) {
        (AiStatus::Pending, AiStatus::Downloaded) => true,
        (AiStatus::Downloaded, AiStatus::Processing) => true,
        (AiStatus::Downloaded, AiStatus::Completed) => true,
        (AiStatus::Processing, AiStatus::Completed) => true,
        // Failure is reachable from every non-terminal state.
        (from, AiStatus::Failed) => !from.is_terminal(),
        _ => false,
    }
}

/// Validate the administrative AI retry action for a scan.
///
/// Retry requires `ai_enabled = true` and `ai_status = Failed`; it resets
/// the sub-machine to Pending and clears the recorded error. Any other
/// combination is rejected without a write.
pub fn validate_ai_retry(
    scan_id: DbId,
    ai_enabled: bool,
    ai_status: Option<AiStatus>,
) -> Result<(), CoreError> {
    if !ai_enabled {
        return Err(CoreError::AiNotEnabled(scan_id));
    }
    match ai_status {
        Some(AiStatus::Failed) => Ok(()),
        Some(other) => Err(CoreError::InvalidState(format!(
            "Scan {scan_id} AI status is {other:?}; only failed AI scans can be retried"
        ))),
        None => Err(CoreError::InvalidState(format!(
            "Scan {scan_id} has no AI status to retry"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_machine_is_one_directional() {
        assert!(scan_transition_allowed(ScanStatus::Pending, ScanStatus::Running));
        assert!(scan_transition_allowed(ScanStatus::Running, ScanStatus::Completed));
        assert!(scan_transition_allowed(ScanStatus::Running, ScanStatus::Failed));
        assert!(scan_transition_allowed(ScanStatus::Pending, ScanStatus::Failed));

        assert!(!scan_transition_allowed(ScanStatus::Completed, ScanStatus::Running));
        assert!(!scan_transition_allowed(ScanStatus::Failed, ScanStatus::Pending));
        assert!(!scan_transition_allowed(ScanStatus::Completed, ScanStatus::Failed));
        assert!(!scan_transition_allowed(ScanStatus::Running, ScanStatus::Pending));
    }

    #[test]
    fn ai_machine_happy_path() {
        assert!(ai_transition_allowed(AiStatus::Pending, AiStatus::Downloaded));
        assert!(ai_transition_allowed(AiStatus::Downloaded, AiStatus::Processing));
        assert!(ai_transition_allowed(AiStatus::Processing, AiStatus::Completed));
        assert!(ai_transition_allowed(AiStatus::Downloaded, AiStatus::Completed));
    }

    #[test]
    fn ai_failure_reachable_from_non_terminal_only() {
        assert!(ai_transition_allowed(AiStatus::Pending, AiStatus::Failed));
        assert!(ai_transition_allowed(AiStatus::Downloaded, AiStatus::Failed));
        assert!(ai_transition_allowed(AiStatus::Processing, AiStatus::Failed));
        assert!(!ai_transition_allowed(AiStatus::Completed, AiStatus::Failed));
        assert!(!ai_transition_allowed(AiStatus::Failed, AiStatus::Failed));
    }

    #[test]
    fn ai_machine_rejects_skips_and_reversals() {
        assert!(!ai_transition_allowed(AiStatus::Pending, AiStatus::Processing));
        assert!(!ai_transition_allowed(AiStatus::Pending, AiStatus::Completed));
        assert!(!ai_transition_allowed(AiStatus::Completed, AiStatus::Pending));
        assert!(!ai_transition_allowed(AiStatus::Downloaded, AiStatus::Pending));
    }

    #[test]
    fn retry_requires_failed_ai_status() {
        assert!(validate_ai_retry(1, true, Some(AiStatus::Failed)).is_ok());

        let err = validate_ai_retry(1, true, Some(AiStatus::Completed)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = validate_ai_retry(1, true, None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn retry_requires_ai_enabled() {
        let err = validate_ai_retry(9, false, Some(AiStatus::Failed)).unwrap_err();
        assert!(matches!(err, CoreError::AiNotEnabled(9)));
    }
}
