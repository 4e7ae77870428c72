use anyhow::{bail, Context, Result};
use std::{collections::HashMap, path::Path, str::FromStr, time::Duration};

use super::DEFAULT_COMPLIANCE_TYPE;

/// Destination for a compliance submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// AWS Systems Manager `PutComplianceItems`.
    Ssm,
    /// JSON POST to a compliance endpoint.
    Http,
    /// Print the payload instead of sending it.
    Stdout,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssm" => Ok(SinkKind::Ssm),
            "http" => Ok(SinkKind::Http),
            "stdout" => Ok(SinkKind::Stdout),
            other => bail!("unknown sink `{other}` (expected ssm, http or stdout)"),
        }
    }
}

/// Environment-driven configuration for submitting compliance items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub resource_id: String,
    pub region: String,
    pub sink: SinkKind,
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub compliance_type: String,
}

impl IngestSettings {
    pub const INSTANCE_ID_ENV: &'static str = "AWS_SSM_INSTANCE_ID";
    pub const REGION_ENV: &'static str = "AWS_SSM_REGION_NAME";
    pub const SINK_ENV: &'static str = "INSPEC_SSM_SINK";
    pub const ENDPOINT_ENV: &'static str = "INSPEC_SSM_ENDPOINT";
    pub const TIMEOUT_ENV: &'static str = "INSPEC_SSM_TIMEOUT";
    pub const RETRIES_ENV: &'static str = "INSPEC_SSM_MAX_RETRIES";
    pub const COMPLIANCE_TYPE_ENV: &'static str = "INSPEC_SSM_COMPLIANCE_TYPE";

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    const DEFAULT_RETRIES: u32 = 2;

    /// Load settings from environment variables.
    ///
    /// * `AWS_SSM_INSTANCE_ID` — managed instance to report against (required).
    /// * `AWS_SSM_REGION_NAME` — region of the SSM endpoint (required).
    /// * `INSPEC_SSM_SINK` — `ssm` (default), `http` or `stdout`.
    /// * `INSPEC_SSM_ENDPOINT` — endpoint override; required for `http`.
    pub fn from_env() -> Result<Self> {
        Self::from_map(utf8_env_vars())
    }

    /// Build settings from an explicit variable map. Callers layering config
    /// files or flags over the environment merge into this map first.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let resource_id = required(&vars, Self::INSTANCE_ID_ENV)?;
        let region = required(&vars, Self::REGION_ENV)?;
        let sink = match non_blank(&vars, Self::SINK_ENV) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid value for {}", Self::SINK_ENV))?,
            None => SinkKind::Ssm,
        };
        let endpoint = non_blank(&vars, Self::ENDPOINT_ENV);
        if sink == SinkKind::Http && endpoint.is_none() {
            bail!(
                "environment variable {} must be set when the http sink is used",
                Self::ENDPOINT_ENV
            );
        }
        let timeout = match non_blank(&vars, Self::TIMEOUT_ENV) {
            Some(raw) => humantime::parse_duration(&raw)
                .with_context(|| format!("invalid duration `{raw}` in {}", Self::TIMEOUT_ENV))?,
            None => Self::DEFAULT_TIMEOUT,
        };
        let max_retries = match non_blank(&vars, Self::RETRIES_ENV) {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("invalid retry count `{raw}` in {}", Self::RETRIES_ENV))?,
            None => Self::DEFAULT_RETRIES,
        };
        let compliance_type = non_blank(&vars, Self::COMPLIANCE_TYPE_ENV)
            .unwrap_or_else(|| DEFAULT_COMPLIANCE_TYPE.to_string());

        Ok(Self {
            resource_id,
            region,
            sink,
            endpoint,
            timeout,
            max_retries,
            compliance_type,
        })
    }
}

/// Snapshot of the process environment. Entries whose name or value is not
/// valid UTF-8 are skipped, so a required variable holding such a value is
/// reported as missing.
pub fn utf8_env_vars() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

fn non_blank(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String> {
    non_blank(vars, key).with_context(|| {
        format!(
            "Unable to find environment variable {key}: make sure this is executed by SSM Agent"
        )
    })
}

/// Derive the SSM execution id from a working directory.
///
/// The agent runs documents from `.../orchestration/<EXECUTION_ID>/downloads`,
/// so the id is the base name of the directory's parent.
pub fn execution_id_from_dir(dir: &Path) -> Option<String> {
    dir.parent()?
        .file_name()?
        .to_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            (IngestSettings::INSTANCE_ID_ENV, "i-0123456789abcdef0"),
            (IngestSettings::REGION_ENV, "eu-west-1"),
        ]
    }

    #[test]
    fn defaults_to_ssm_sink() {
        let settings = IngestSettings::from_map(vars(&base())).expect("should load settings");
        assert_eq!(settings.resource_id, "i-0123456789abcdef0");
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.sink, SinkKind::Ssm);
        assert!(settings.endpoint.is_none());
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.compliance_type, "Custom:InSpec");
    }

    #[test]
    fn errors_when_instance_id_missing() {
        let err = IngestSettings::from_map(vars(&[(IngestSettings::REGION_ENV, "us-east-1")]))
            .expect_err("missing instance id should error");
        let message = err.to_string();
        assert!(message.contains(IngestSettings::INSTANCE_ID_ENV));
        assert!(message.contains("SSM Agent"));
    }

    #[test]
    fn errors_when_region_blank() {
        let err = IngestSettings::from_map(vars(&[
            (IngestSettings::INSTANCE_ID_ENV, "i-1"),
            (IngestSettings::REGION_ENV, "  "),
        ]))
        .expect_err("blank region should error");
        assert!(err.to_string().contains(IngestSettings::REGION_ENV));
    }

    #[test]
    fn http_sink_requires_endpoint() {
        let mut pairs = base();
        pairs.push((IngestSettings::SINK_ENV, "http"));
        let err = IngestSettings::from_map(vars(&pairs)).expect_err("endpoint required");
        assert!(err.to_string().contains(IngestSettings::ENDPOINT_ENV));
    }

    #[test]
    fn parses_overrides() {
        let mut pairs = base();
        pairs.extend([
            (IngestSettings::SINK_ENV, "HTTP"),
            (IngestSettings::ENDPOINT_ENV, "http://localhost:9000"),
            (IngestSettings::TIMEOUT_ENV, "1m 30s"),
            (IngestSettings::RETRIES_ENV, "5"),
            (IngestSettings::COMPLIANCE_TYPE_ENV, "Custom:Baseline"),
        ]);
        let settings = IngestSettings::from_map(vars(&pairs)).unwrap();
        assert_eq!(settings.sink, SinkKind::Http);
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.timeout, Duration::from_secs(90));
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.compliance_type, "Custom:Baseline");
    }

    #[test]
    fn rejects_unknown_sink_and_bad_numbers() {
        let mut pairs = base();
        pairs.push((IngestSettings::SINK_ENV, "kafka"));
        let err = IngestSettings::from_map(vars(&pairs)).unwrap_err();
        assert!(format!("{err:#}").contains("unknown sink `kafka`"));

        let mut pairs = base();
        pairs.push((IngestSettings::RETRIES_ENV, "many"));
        let err = IngestSettings::from_map(vars(&pairs)).unwrap_err();
        assert!(err.to_string().contains(IngestSettings::RETRIES_ENV));
    }

    #[test]
    fn from_env_reads_process_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(IngestSettings::INSTANCE_ID_ENV, "i-env");
        env::set_var(IngestSettings::REGION_ENV, "ap-southeast-2");
        env::remove_var(IngestSettings::SINK_ENV);
        env::remove_var(IngestSettings::ENDPOINT_ENV);
        let settings = IngestSettings::from_env().expect("env settings");
        assert_eq!(settings.resource_id, "i-env");
        assert_eq!(settings.region, "ap-southeast-2");
        env::remove_var(IngestSettings::INSTANCE_ID_ENV);
        env::remove_var(IngestSettings::REGION_ENV);
    }

    #[cfg(unix)]
    #[test]
    fn skips_non_utf8_environment_entries() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let _guard = ENV_LOCK.lock().unwrap();
        let garbled = "INSPEC_SSM_TEST_GARBLED";
        env::set_var(garbled, OsString::from_vec(vec![0x66, 0x6f, 0xff]));
        env::set_var(IngestSettings::INSTANCE_ID_ENV, OsString::from_vec(vec![0xfe]));
        env::set_var(IngestSettings::REGION_ENV, "us-east-1");

        let vars = utf8_env_vars();
        assert!(!vars.contains_key(garbled));
        assert_eq!(vars[IngestSettings::REGION_ENV], "us-east-1");
        let err = IngestSettings::from_env().expect_err("undecodable instance id is missing");
        assert!(err.to_string().contains(IngestSettings::INSTANCE_ID_ENV));

        env::remove_var(garbled);
        env::remove_var(IngestSettings::INSTANCE_ID_ENV);
        env::remove_var(IngestSettings::REGION_ENV);
    }

    #[test]
    fn execution_id_is_parent_base_name() {
        let dir = Path::new(
            "/var/lib/amazon/ssm/i-0abc/document/orchestration/4f9c1a2b-run/downloads",
        );
        assert_eq!(execution_id_from_dir(dir).as_deref(), Some("4f9c1a2b-run"));
        assert_eq!(execution_id_from_dir(Path::new("/")), None);
    }
}
