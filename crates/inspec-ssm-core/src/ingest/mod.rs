mod http;
mod settings;
mod ssm;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::compliance::ComplianceItem;

pub use http::HttpComplianceSink;
pub use settings::{execution_id_from_dir, utf8_env_vars, IngestSettings, SinkKind};
pub use ssm::SsmComplianceSink;

pub const DEFAULT_RESOURCE_TYPE: &str = "ManagedInstance";
pub const DEFAULT_COMPLIANCE_TYPE: &str = "Custom:InSpec";
pub const DEFAULT_EXECUTION_TYPE: &str = "Command";

/// Run metadata attached to every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub execution_time: DateTime<Utc>,
    pub execution_type: String,
}

/// Everything the compliance service needs to record one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceSubmission {
    pub resource_id: String,
    pub resource_type: String,
    pub compliance_type: String,
    pub execution: ExecutionSummary,
    pub items: Vec<ComplianceItem>,
}

impl ComplianceSubmission {
    /// Assemble a submission stamped with the current time.
    pub fn new(
        settings: &IngestSettings,
        execution_id: impl Into<String>,
        items: Vec<ComplianceItem>,
    ) -> Self {
        Self::at(settings, execution_id, Utc::now(), items)
    }

    pub fn at(
        settings: &IngestSettings,
        execution_id: impl Into<String>,
        execution_time: DateTime<Utc>,
        items: Vec<ComplianceItem>,
    ) -> Self {
        Self {
            resource_id: settings.resource_id.clone(),
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            compliance_type: settings.compliance_type.clone(),
            execution: ExecutionSummary {
                execution_id: execution_id.into(),
                execution_time,
                execution_type: DEFAULT_EXECUTION_TYPE.to_string(),
            },
            items,
        }
    }

    /// Wire representation shared by the HTTP and stdout sinks; field names
    /// follow the SSM `PutComplianceItems` request.
    pub fn to_wire_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(WireSubmission::from(self))
    }
}

/// Abstraction over compliance backends so SSM, HTTP and dry-run targets can be swapped.
#[async_trait]
pub trait ComplianceSink: Send + Sync {
    /// Deliver the submission, returning an error if the backend rejected it.
    async fn submit(&self, submission: &ComplianceSubmission) -> Result<()>;
}

/// Prints the wire payload instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct StdoutComplianceSink;

#[async_trait]
impl ComplianceSink for StdoutComplianceSink {
    async fn submit(&self, submission: &ComplianceSubmission) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(&submission.to_wire_json()?)?);
        info!(items = submission.items.len(), "printed compliance submission");
        Ok(())
    }
}

/// Construct the sink selected in `settings`.
pub async fn build_sink(settings: &IngestSettings) -> Result<Box<dyn ComplianceSink>> {
    Ok(match settings.sink {
        SinkKind::Ssm => Box::new(SsmComplianceSink::new(settings).await),
        SinkKind::Http => Box::new(HttpComplianceSink::new(settings)?),
        SinkKind::Stdout => Box::new(StdoutComplianceSink),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireSubmission<'a> {
    resource_id: &'a str,
    resource_type: &'a str,
    compliance_type: &'a str,
    execution_summary: WireExecutionSummary<'a>,
    items: Vec<WireItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireExecutionSummary<'a> {
    execution_id: &'a str,
    execution_time: String,
    execution_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireItem<'a> {
    id: &'a str,
    severity: &'static str,
    status: &'static str,
    title: &'a str,
}

impl<'a> From<&'a ComplianceSubmission> for WireSubmission<'a> {
    fn from(submission: &'a ComplianceSubmission) -> Self {
        Self {
            resource_id: &submission.resource_id,
            resource_type: &submission.resource_type,
            compliance_type: &submission.compliance_type,
            execution_summary: WireExecutionSummary {
                execution_id: &submission.execution.execution_id,
                execution_time: submission.execution.execution_time.to_rfc3339(),
                execution_type: &submission.execution.execution_type,
            },
            items: submission
                .items
                .iter()
                .map(|item| WireItem {
                    id: &item.id,
                    severity: item.severity.as_str(),
                    status: item.status.as_str(),
                    title: &item.title,
                })
                .collect(),
        }
    }
}
