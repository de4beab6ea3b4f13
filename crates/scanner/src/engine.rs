//! The scan-engine trait and its data shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use accesspulse_core::wcag::{IssueCounts, WcagLevel};

/// Error from a single engine invocation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine service could not be reached.
    #[error("Scan engine unreachable: {0}")]
    Unreachable(String),

    /// The engine rejected the request or failed mid-scan.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// The engine's response could not be decoded.
    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
}

/// One accessibility issue as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssue {
    /// Rule identifier, e.g. `"color-contrast"`.
    pub rule_id: String,
    /// Engine impact string: critical / serious / moderate / minor.
    pub impact: String,
    /// Human-readable description.
    pub description: String,
    /// CSS selector of the offending node, when available.
    #[serde(default)]
    pub selector: Option<String>,
}

/// Successful engine response for one URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanOutcome {
    pub issues: Vec<RawIssue>,
    pub passes: i32,
    pub inapplicable: i32,
    /// Wall-clock scan duration reported by the engine.
    pub duration_ms: i32,
    #[serde(default)]
    pub page_title: Option<String>,
}

impl ScanOutcome {
    /// Tally issue counters by severity bucket.
    pub fn counts(&self) -> IssueCounts {
        IssueCounts::tally(self.issues.iter().map(|i| i.impact.as_str()), self.passes)
    }
}

/// The opaque page-scanning collaborator.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Scan one URL against a WCAG conformance level.
    async fn scan(&self, url: &str, level: WcagLevel) -> Result<ScanOutcome, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_counts_tally_by_impact() {
        let outcome = ScanOutcome {
            issues: vec![
                RawIssue {
                    rule_id: "color-contrast".into(),
                    impact: "serious".into(),
                    description: "insufficient contrast".into(),
                    selector: Some("p.intro".into()),
                },
                RawIssue {
                    rule_id: "image-alt".into(),
                    impact: "critical".into(),
                    description: "missing alt text".into(),
                    selector: None,
                },
            ],
            passes: 12,
            inapplicable: 3,
            duration_ms: 850,
            page_title: Some("Home".into()),
        };
        let counts = outcome.counts();
        assert_eq!(counts.total_issues, 2);
        assert_eq!(counts.critical_count, 1);
        assert_eq!(counts.serious_count, 1);
        assert_eq!(counts.passed_checks, 12);
    }
}
