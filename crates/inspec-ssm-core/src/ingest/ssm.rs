use super::{ComplianceSink, ComplianceSubmission, IngestSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ssm::{
    primitives::DateTime,
    types::{ComplianceExecutionSummary, ComplianceItemEntry, ComplianceSeverity, ComplianceStatus},
    Client,
};
use tracing::{info, instrument};

/// Submits compliance items through AWS Systems Manager `PutComplianceItems`.
#[derive(Debug, Clone)]
pub struct SsmComplianceSink {
    client: Client,
}

impl SsmComplianceSink {
    /// Resolve credentials from the default provider chain for the configured region.
    pub async fn new(settings: &IngestSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(settings.timeout)
                    .build(),
            );
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Self {
            client: Client::new(&config),
        }
    }
}

fn to_entries(submission: &ComplianceSubmission) -> Result<Vec<ComplianceItemEntry>> {
    submission
        .items
        .iter()
        .map(|item| {
            ComplianceItemEntry::builder()
                .id(&item.id)
                .title(&item.title)
                .severity(ComplianceSeverity::from(item.severity.as_str()))
                .status(ComplianceStatus::from(item.status.as_str()))
                .build()
                .with_context(|| format!("invalid compliance item `{}`", item.id))
        })
        .collect()
}

fn to_execution_summary(submission: &ComplianceSubmission) -> Result<ComplianceExecutionSummary> {
    let execution = &submission.execution;
    ComplianceExecutionSummary::builder()
        .execution_id(&execution.execution_id)
        .execution_time(DateTime::from_millis(
            execution.execution_time.timestamp_millis(),
        ))
        .execution_type(&execution.execution_type)
        .build()
        .context("invalid compliance execution summary")
}

#[async_trait]
impl ComplianceSink for SsmComplianceSink {
    #[instrument(skip_all, fields(resource_id = %submission.resource_id, items = submission.items.len()))]
    async fn submit(&self, submission: &ComplianceSubmission) -> Result<()> {
        self.client
            .put_compliance_items()
            .resource_id(&submission.resource_id)
            .resource_type(&submission.resource_type)
            .compliance_type(&submission.compliance_type)
            .execution_summary(to_execution_summary(submission)?)
            .set_items(Some(to_entries(submission)?))
            .send()
            .await
            .context("failed to submit compliance items to SSM")?;
        info!("submitted compliance items to SSM");
        Ok(())
    }
}
