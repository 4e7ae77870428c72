use std::{fs, path::PathBuf};

use insta::assert_json_snapshot;
use inspec_ssm_core::{
    map_to_compliance_items, ComplianceItem, ComplianceMapping, ComplianceStatus, InSpecReport,
    Severity,
};
use serde::Serialize;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(name: &str) -> InSpecReport {
    let path = fixture_dir().join(name);
    let file = fs::File::open(&path)
        .unwrap_or_else(|err| panic!("failed to open fixture {}: {err}", path.display()));
    InSpecReport::from_reader(file)
        .unwrap_or_else(|err| panic!("failed to decode fixture {}: {err}", path.display()))
}

#[derive(Serialize)]
struct SeverityRow {
    severity: &'static str,
    compliant: usize,
    non_compliant: usize,
}

#[derive(Serialize)]
struct MappingView<'a> {
    items: &'a [ComplianceItem],
    compliant: usize,
    non_compliant: usize,
    by_severity: Vec<SeverityRow>,
}

impl<'a> From<&'a ComplianceMapping> for MappingView<'a> {
    fn from(mapping: &'a ComplianceMapping) -> Self {
        Self {
            items: &mapping.items,
            compliant: mapping.counts.compliant,
            non_compliant: mapping.counts.non_compliant,
            by_severity: Severity::ALL
                .into_iter()
                .map(|severity| SeverityRow {
                    severity: severity.as_str(),
                    compliant: mapping.counts.compliant_for(severity),
                    non_compliant: mapping.counts.non_compliant_for(severity),
                })
                .collect(),
        }
    }
}

#[test]
fn linux_baseline_snapshot() {
    let report = load_fixture("linux_baseline.json");
    let mapping = map_to_compliance_items(&report);
    assert_json_snapshot!("linux_baseline", MappingView::from(&mapping));
}

#[test]
fn linux_baseline_counts() {
    let report = load_fixture("linux_baseline.json");
    assert_eq!(report.result_count(), 9);

    let mapping = map_to_compliance_items(&report);
    assert_eq!(mapping.items.len(), 7);
    assert_eq!(mapping.counts.compliant, 4);
    assert_eq!(mapping.counts.non_compliant, 3);
    assert_eq!(mapping.counts.compliant_for(Severity::Critical), 3);
    assert_eq!(mapping.counts.non_compliant_for(Severity::High), 2);

    // The skipped/errored `os-01` in the second profile never reaches the output.
    let os_01: Vec<_> = mapping
        .items
        .iter()
        .filter(|item| item.id.starts_with("os-01-"))
        .collect();
    assert_eq!(os_01.len(), 1);
    assert_eq!(os_01[0].status, ComplianceStatus::Compliant);
}

#[test]
fn mapping_is_repeatable() {
    let report = load_fixture("linux_baseline.json");
    let first = serde_json::to_vec(&map_to_compliance_items(&report)).unwrap();
    let second = serde_json::to_vec(&map_to_compliance_items(&report)).unwrap();
    assert_eq!(first, second);
}
