use super::{ComplianceSink, ComplianceSubmission, IngestSettings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Posts submissions as JSON to `<endpoint>/compliance-items`.
#[derive(Debug, Clone)]
pub struct HttpComplianceSink {
    http: Client,
    url: String,
    max_retries: u32,
}

impl HttpComplianceSink {
    pub fn new(settings: &IngestSettings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("an endpoint must be configured for the http sink"))?;
        let url = format!("{}/compliance-items", endpoint.trim_end_matches('/'));

        let http = Client::builder()
            .user_agent(concat!("inspec-ssm/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .context("failed to build compliance HTTP client")?;

        Ok(Self {
            http,
            url,
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl ComplianceSink for HttpComplianceSink {
    #[instrument(skip_all, fields(url = %self.url, items = submission.items.len()))]
    async fn submit(&self, submission: &ComplianceSubmission) -> Result<()> {
        let payload = submission
            .to_wire_json()
            .context("failed to serialize compliance submission")?;

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self.http.post(&self.url).json(&payload).send().await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err).context("failed to call compliance endpoint");
                    }
                    warn!(attempt, error = %err, "compliance endpoint unreachable; retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                    continue;
                }
            };

            if !response.status().is_success() {
                if attempt >= self.max_retries || !is_retryable(response.status()) {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    bail!("compliance endpoint error ({}): {}", status, body);
                }
                warn!(attempt, status = %response.status(), "compliance endpoint rejected submission; retrying");
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            info!(status = %response.status(), "submitted compliance items");
            return Ok(());
        }
    }
}

/// Client errors other than throttling will not succeed on a second attempt.
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
