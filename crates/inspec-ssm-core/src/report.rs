use std::fmt::Write;

use serde::Serialize;

use crate::compliance::{AggregateCounts, ComplianceItem, ComplianceMapping, Severity};
use crate::inspec::InSpecReport;

/// Format styles supported when printing a mapping.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a printable summary of a mapped report.
pub fn render_mapping(
    report: &InSpecReport,
    mapping: &ComplianceMapping,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(report, mapping),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonMapping::from(mapping))?),
    }
}

fn render_human(report: &InSpecReport, mapping: &ComplianceMapping) -> anyhow::Result<String> {
    let mut out = String::new();
    let platform = match (&report.platform.name, &report.platform.release) {
        (Some(name), Some(release)) => format!("{name} {release}"),
        (Some(name), None) => name.clone(),
        _ => "unknown".to_string(),
    };
    writeln!(out, "Platform: {platform}")?;
    if let Some(version) = &report.version {
        writeln!(out, "InSpec Version: {version}")?;
    }
    writeln!(
        out,
        "Results: {} evaluated, {} reported",
        report.result_count(),
        mapping.items.len()
    )?;
    writeln!(
        out,
        "Compliant: {} • Non-compliant: {}",
        mapping.counts.compliant, mapping.counts.non_compliant
    )?;
    writeln!(out)?;

    writeln!(out, "By Severity:")?;
    for severity in Severity::ALL {
        writeln!(
            out,
            "  - {severity:>8}: {ok} compliant, {bad} non-compliant",
            severity = severity.as_str(),
            ok = mapping.counts.compliant_for(severity),
            bad = mapping.counts.non_compliant_for(severity),
        )?;
    }
    writeln!(out)?;

    if mapping.items.is_empty() {
        writeln!(out, "No compliance items produced.")?;
    } else {
        writeln!(out, "Items:")?;
        for item in &mapping.items {
            writeln!(
                out,
                "  - {id} [{status} / {severity}] {title}",
                id = item.id,
                status = item.status,
                severity = item.severity,
                title = sanitize_title(&item.title),
            )?;
        }
    }

    Ok(out)
}

fn sanitize_title(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\n' | '\r' => ' ',
            _ => c,
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct JsonMapping<'a> {
    items: &'a [ComplianceItem],
    counts: &'a AggregateCounts,
}

impl<'a> From<&'a ComplianceMapping> for JsonMapping<'a> {
    fn from(mapping: &'a ComplianceMapping) -> Self {
        Self {
            items: &mapping.items,
            counts: &mapping.counts,
        }
    }
}
