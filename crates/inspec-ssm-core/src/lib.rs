pub mod compliance;
pub mod ingest;
pub mod inspec;
pub mod report;

pub use compliance::{
    mapper::{map_to_compliance_items, ComplianceMapper},
    AggregateCounts, ComplianceItem, ComplianceMapping, ComplianceStatus, Severity,
    SeverityThresholds, ThresholdError,
};
pub use ingest::{
    build_sink, execution_id_from_dir, utf8_env_vars, ComplianceSink, ComplianceSubmission,
    IngestSettings, SinkKind,
};
pub use inspec::{CheckOutcome, CheckResult, Control, InSpecReport, Profile, ReportDecodeError};
