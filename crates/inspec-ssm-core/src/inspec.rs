use std::io::Read;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Root of an InSpec JSON reporter document.
///
/// Only the fields needed to build compliance items are required; metadata is
/// optional and everything else in the reporter schema is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InSpecReport {
    #[serde(default)]
    pub platform: Platform,
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub controls: Vec<Control>,
}

/// A single compliance rule and every result it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Control identifier; not unique across profiles.
    pub id: String,
    /// InSpec emits `null` for controls declared without a title.
    #[serde(default)]
    pub title: Option<String>,
    /// Nominally within 0.0..=1.0, but out-of-range values are accepted.
    pub impact: f64,
    pub results: Vec<CheckResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: String,
    /// Absent or `null` for some skipped and errored results.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code_desc: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Coarse interpretation of the free-form result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed,
    Failed,
    /// Skipped, errored or any status InSpec may add later.
    Other,
}

impl CheckResult {
    pub fn outcome(&self) -> CheckOutcome {
        match self.status.as_str() {
            "passed" => CheckOutcome::Passed,
            "failed" => CheckOutcome::Failed,
            _ => CheckOutcome::Other,
        }
    }
}

/// Failures raised while turning raw input into an [`InSpecReport`].
#[derive(Debug, Error)]
pub enum ReportDecodeError {
    #[error("failed to read InSpec report: {0}")]
    Io(#[from] std::io::Error),
    #[error("input is not a valid InSpec JSON report: {0}")]
    Json(#[from] serde_json::Error),
}

impl InSpecReport {
    pub fn from_json_str(raw: &str) -> Result<Self, ReportDecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ReportDecodeError> {
        let mut raw = String::new();
        reader.read_to_string(&mut raw)?;
        Self::from_json_str(&raw)
    }

    /// Total number of results across every profile and control.
    pub fn result_count(&self) -> usize {
        self.profiles
            .iter()
            .flat_map(|profile| &profile.controls)
            .map(|control| control.results.len())
            .sum()
    }
}
