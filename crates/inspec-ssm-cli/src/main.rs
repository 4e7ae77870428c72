mod file_config;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use inspec_ssm_core::{
    build_sink, execution_id_from_dir, utf8_env_vars,
    report::{render_mapping, OutputFormat},
    ComplianceMapper, ComplianceSubmission, InSpecReport, IngestSettings,
};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::file_config::FileConfig;

#[derive(Parser, Debug)]
#[command(
    name = "inspec-ssm",
    author,
    version,
    about = "Report InSpec results as AWS Systems Manager compliance items"
)]
struct Cli {
    /// Optional configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Read the InSpec JSON report from a file instead of stdin
    #[arg(long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map the report and submit it to the compliance service
    Submit {
        /// Override the submission target
        #[arg(long, value_enum)]
        sink: Option<SinkArg>,
        /// Override the compliance endpoint
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Use this execution id instead of deriving it from the working directory
        #[arg(long, value_name = "ID")]
        execution_id: Option<String>,
    },
    /// Map the report and print the resulting compliance items
    Map {
        /// Emit items as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkArg {
    Ssm,
    Http,
    Stdout,
}

impl SinkArg {
    fn as_str(self) -> &'static str {
        match self {
            SinkArg::Ssm => "ssm",
            SinkArg::Http => "http",
            SinkArg::Stdout => "stdout",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let command = cli.command.unwrap_or(Commands::Submit {
        sink: None,
        endpoint: None,
        execution_id: None,
    });
    match command {
        Commands::Submit {
            sink,
            endpoint,
            execution_id,
        } => {
            let mut vars = file_config.env_defaults();
            vars.extend(utf8_env_vars());
            if let Some(sink) = sink {
                vars.insert(IngestSettings::SINK_ENV.into(), sink.as_str().into());
            }
            if let Some(endpoint) = endpoint {
                vars.insert(IngestSettings::ENDPOINT_ENV.into(), endpoint);
            }
            // Configuration problems are reported before touching the input.
            let settings = IngestSettings::from_map(vars)?;
            let execution_id = match execution_id {
                Some(id) => id,
                None => current_execution_id()?,
            };
            let report = read_report(cli.input.as_deref()).await?;
            submit(&file_config, &settings, &report, execution_id).await?
        }
        Commands::Map { json } => {
            let report = read_report(cli.input.as_deref()).await?;
            map(&file_config, &report, json)?
        }
    }
    Ok(())
}

async fn read_report(input: Option<&Path>) -> Result<InSpecReport> {
    let raw = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read InSpec report from {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("failed to read InSpec report from stdin")?;
            raw
        }
    };
    Ok(InSpecReport::from_json_str(&raw)?)
}

fn current_execution_id() -> Result<String> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    execution_id_from_dir(&cwd).ok_or_else(|| {
        anyhow!(
            "unable to derive execution id from working directory {}; pass --execution-id",
            cwd.display()
        )
    })
}

async fn submit(
    file_config: &FileConfig,
    settings: &IngestSettings,
    report: &InSpecReport,
    execution_id: String,
) -> Result<()> {
    let mapping = ComplianceMapper::with_thresholds(file_config.thresholds()).map(report);
    info!(
        execution_id = %execution_id,
        compliant = mapping.counts.compliant,
        non_compliant = mapping.counts.non_compliant,
        "built compliance items"
    );

    let submission = ComplianceSubmission::new(settings, execution_id, mapping.items);
    let sink = build_sink(settings).await?;
    sink.submit(&submission)
        .await
        .with_context(|| format!("failed to submit compliance report for {}", settings.resource_id))?;

    println!("Completed InSpec checks");
    Ok(())
}

fn map(file_config: &FileConfig, report: &InSpecReport, json: bool) -> Result<()> {
    let mapping = ComplianceMapper::with_thresholds(file_config.thresholds()).map(report);
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    println!("{}", render_mapping(report, &mapping, format)?);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aws_config=warn,aws_smithy_runtime=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
