//! WCAG conformance levels and issue severity classification.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// WCAG conformance level a scan is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcagLevel {
    A,
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "AAA")]
    Aaa,
}

impl WcagLevel {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aa => "AA",
            Self::Aaa => "AAA",
        }
    }

    /// Parse the database / wire representation.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "A" => Ok(Self::A),
            "AA" => Ok(Self::Aa),
            "AAA" => Ok(Self::Aaa),
            other => Err(CoreError::Validation(format!(
                "Unknown WCAG level: '{other}'. Valid levels: A, AA, AAA"
            ))),
        }
    }
}

/// Severity bucket of a single accessibility issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    Serious,
    Moderate,
    Minor,
}

impl IssueSeverity {
    /// Map an engine impact string to a severity bucket.
    ///
    /// Unknown impacts classify as Minor rather than failing the scan.
    pub fn from_impact(impact: &str) -> Self {
        match impact {
            "critical" => Self::Critical,
            "serious" => Self::Serious,
            "moderate" => Self::Moderate,
            _ => Self::Minor,
        }
    }
}

/// Per-scan issue counters, the unit the batch aggregates sum over.
///
/// Field names are a stable contract consumed by the report renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub total_issues: i32,
    pub critical_count: i32,
    pub serious_count: i32,
    pub moderate_count: i32,
    pub minor_count: i32,
    pub passed_checks: i32,
}

impl IssueCounts {
    /// Tally counters from a stream of issue impact strings plus the number
    /// of passed checks reported by the engine.
    pub fn tally<'a>(impacts: impl IntoIterator<Item = &'a str>, passed_checks: i32) -> Self {
        let mut counts = Self {
            passed_checks,
            ..Self::default()
        };
        for impact in impacts {
            counts.total_issues += 1;
            match IssueSeverity::from_impact(impact) {
                IssueSeverity::Critical => counts.critical_count += 1,
                IssueSeverity::Serious => counts.serious_count += 1,
                IssueSeverity::Moderate => counts.moderate_count += 1,
                IssueSeverity::Minor => counts.minor_count += 1,
            }
        }
        counts
    }
}
