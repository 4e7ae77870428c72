use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use inspec_ssm_core::{IngestSettings, SeverityThresholds};
use serde::Deserialize;

/// Settings read from `--config`. Every value is a fallback beneath the
/// environment and command-line flags.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub ingest: IngestSection,
    #[serde(default)]
    pub severity: Option<SeverityThresholds>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestSection {
    pub sink: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Option<String>,
    pub max_retries: Option<u32>,
    pub compliance_type: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        if let Some(thresholds) = &config.severity {
            thresholds
                .validate()
                .with_context(|| format!("invalid [severity] section in {}", path.display()))?;
        }
        Ok(config)
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        self.severity.unwrap_or_default()
    }

    /// Express file values as environment entries so they can be layered
    /// under the real environment before settings are parsed.
    pub fn env_defaults(&self) -> HashMap<String, String> {
        let ingest = &self.ingest;
        [
            (IngestSettings::SINK_ENV, ingest.sink.clone()),
            (IngestSettings::ENDPOINT_ENV, ingest.endpoint.clone()),
            (IngestSettings::TIMEOUT_ENV, ingest.timeout.clone()),
            (
                IngestSettings::RETRIES_ENV,
                ingest.max_retries.map(|n| n.to_string()),
            ),
            (
                IngestSettings::COMPLIANCE_TYPE_ENV,
                ingest.compliance_type.clone(),
            ),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
    }
}
