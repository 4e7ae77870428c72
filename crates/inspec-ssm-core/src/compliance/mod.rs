use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod mapper;

/// Impact cut points that map a control's numeric impact into a severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            high: 0.4,
            critical: 0.7,
        }
    }
}

impl SeverityThresholds {
    /// Reject cut points that would make classification meaningless: NaN
    /// thresholds never compare true, so every impact would land in `Low`.
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (name, value) in [("high", self.high), ("critical", self.critical)] {
            if !value.is_finite() {
                return Err(ThresholdError::NonFinite { name, value });
            }
        }
        if self.high > self.critical {
            return Err(ThresholdError::Inverted {
                high: self.high,
                critical: self.critical,
            });
        }
        Ok(())
    }
}

/// Errors emitted while validating severity thresholds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("severity threshold `{name}` must be a finite number (got {value})")]
    NonFinite { name: &'static str, value: f64 },
    #[error("severity threshold `high` ({high}) must not exceed `critical` ({critical})")]
    Inverted { high: f64, critical: f64 },
}

/// Severity labels understood by the compliance service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::High, Severity::Critical];

    /// Map a control impact (nominally 0.0–1.0) into a severity.
    pub fn classify(impact: f64) -> Self {
        Self::classify_with_thresholds(impact, &SeverityThresholds::default())
    }

    /// Map an impact using caller-provided thresholds.
    ///
    /// Negative and NaN impacts cannot be placed in a band and are reported
    /// as `Critical`.
    pub fn classify_with_thresholds(impact: f64, thresholds: &SeverityThresholds) -> Self {
        if impact.is_nan() || impact < 0.0 || impact >= thresholds.critical {
            Self::Critical
        } else if impact >= thresholds.high {
            Self::High
        } else {
            Self::Low
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

impl ComplianceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "COMPLIANT",
            ComplianceStatus::NonCompliant => "NON_COMPLIANT",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized finding ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceItem {
    /// `<control id>-<position in the output sequence>`.
    pub id: String,
    pub severity: Severity,
    pub status: ComplianceStatus,
    pub title: String,
}

/// Pass/fail tallies accumulated while mapping a single report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounts {
    pub compliant: usize,
    pub non_compliant: usize,
    pub compliant_by_severity: BTreeMap<Severity, usize>,
    pub non_compliant_by_severity: BTreeMap<Severity, usize>,
}

impl AggregateCounts {
    pub fn record(&mut self, status: ComplianceStatus, severity: Severity) {
        match status {
            ComplianceStatus::Compliant => {
                self.compliant += 1;
                *self.compliant_by_severity.entry(severity).or_insert(0) += 1;
            }
            ComplianceStatus::NonCompliant => {
                self.non_compliant += 1;
                *self.non_compliant_by_severity.entry(severity).or_insert(0) += 1;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.compliant + self.non_compliant
    }

    pub fn compliant_for(&self, severity: Severity) -> usize {
        self.compliant_by_severity
            .get(&severity)
            .copied()
            .unwrap_or(0)
    }

    pub fn non_compliant_for(&self, severity: Severity) -> usize {
        self.non_compliant_by_severity
            .get(&severity)
            .copied()
            .unwrap_or(0)
    }
}

/// Output of one mapper run: ordered items plus their tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceMapping {
    pub items: Vec<ComplianceItem>,
    pub counts: AggregateCounts,
}
