use tracing::{debug, instrument, trace};

use super::{ComplianceItem, ComplianceMapping, ComplianceStatus, Severity, SeverityThresholds};
use crate::inspec::{CheckOutcome, InSpecReport};

/// Converts InSpec results into compliance items.
///
/// Stateless apart from its thresholds, so a single mapper can be shared
/// across threads and reports.
#[derive(Debug, Clone, Default)]
pub struct ComplianceMapper {
    thresholds: SeverityThresholds,
}

impl ComplianceMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Walk profiles, controls and results in document order and emit one
    /// item per passed or failed result. Any other status is dropped without
    /// touching the counts.
    #[instrument(skip_all, fields(profiles = report.profiles.len()))]
    pub fn map(&self, report: &InSpecReport) -> ComplianceMapping {
        let mut mapping = ComplianceMapping::default();

        for profile in &report.profiles {
            for control in &profile.controls {
                let severity = Severity::classify_with_thresholds(control.impact, &self.thresholds);
                let control_title = control.title.as_deref().unwrap_or_default();
                for result in &control.results {
                    let status = match result.outcome() {
                        CheckOutcome::Passed => ComplianceStatus::Compliant,
                        CheckOutcome::Failed => ComplianceStatus::NonCompliant,
                        CheckOutcome::Other => {
                            trace!(control = %control.id, status = %result.status, "skipping result");
                            continue;
                        }
                    };
                    mapping.counts.record(status, severity);

                    // Suffix is the global output position, not a per-control index.
                    let id = format!("{}-{}", control.id, mapping.items.len());
                    mapping.items.push(ComplianceItem {
                        id,
                        severity,
                        status,
                        title: format!("{} : {}", control_title, result.code_desc),
                    });
                }
            }
        }

        debug!(
            compliant = mapping.counts.compliant,
            non_compliant = mapping.counts.non_compliant,
            "mapped InSpec report"
        );
        mapping
    }
}

/// Map a report with the default severity thresholds.
pub fn map_to_compliance_items(report: &InSpecReport) -> ComplianceMapping {
    ComplianceMapper::new().map(report)
}
