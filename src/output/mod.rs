use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;

use crate::cli::ReportFormat;
use crate::pipeline::{ItemOutcome, PipelineReport};
use crate::utils::{format_duration, format_file_size};

/// Save a run report to file
pub fn save_to_file(report: &PipelineReport, path: &Path, format: &ReportFormat) -> Result<()> {
    let content = render(report, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a run report to the console
pub fn print_to_console(report: &PipelineReport, format: &ReportFormat) -> Result<()> {
    let content = render(report, format)?;
    println!("{}", content);
    Ok(())
}

pub fn render(report: &PipelineReport, format: &ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(format_as_text(report)),
        ReportFormat::Json => format_as_json(report),
    }
}

pub fn format_as_json(report: &PipelineReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize run report")
}

pub fn format_as_text(report: &PipelineReport) -> String {
    let mut out = String::new();
    let params = &report.request.params;

    let _ = writeln!(out, "Mashup for \"{}\"", params.subject);
    let _ = writeln!(
        out,
        "  {} videos requested, {}s per track",
        params.item_count, params.duration_secs
    );

    for stage in &report.stages {
        let origin = if stage.cached { " (reused)" } else { "" };
        let _ = writeln!(
            out,
            "  {:<8} {} produced, {} skipped{}",
            stage.stage.as_str(),
            stage.produced(),
            stage.skipped(),
            origin
        );
        for item in &stage.items {
            if let ItemOutcome::Skipped(reason) = &item.outcome {
                let _ = writeln!(out, "           - {}: {}", item.name, reason);
            }
        }
    }

    let length = report
        .composed
        .duration_secs
        .map(format_duration)
        .unwrap_or_else(|| "unknown length".to_string());
    let _ = writeln!(
        out,
        "  Output:  {} ({} tracks, {})",
        report.composed.output.display(),
        report.composed.tracks.len(),
        length
    );

    let size = fs_err::metadata(&report.archive)
        .map(|m| format_file_size(m.len()))
        .unwrap_or_else(|_| "missing".to_string());
    let _ = write!(out, "  Archive: {} ({})", report.archive.display(), size);

    out
}
