//! Run report rendering.
//!
//! Formats a [`RunReport`] as human-readable lines for text mode; JSON mode
//! serializes the report directly.

use crate::model::{JobStatus, RunReport};

/// Pre-formatted lines for text output.
pub struct ReportSummary {
    pub lines: Vec<String>,
}

fn status_text(status: JobStatus) -> String {
    match status {
        JobStatus::Succeeded => "succeeded".to_string(),
        JobStatus::Failed { exit_code } => format!("failed (exit code {exit_code})"),
        JobStatus::Cancelled => "cancelled".to_string(),
    }
}

/// Build the text summary for a finished run.
pub fn build_report_lines(report: &RunReport) -> ReportSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "Job {}: {} {}",
        report.job_id,
        report.mode.as_arg(),
        report.input.display()
    ));
    lines.push(format!(
        "Status: {} after {:.1}s",
        status_text(report.status),
        report.duration_ms as f64 / 1000.0
    ));
    lines.push(format!("Output directory: {}", report.output_dir.display()));

    if report.results.is_empty() {
        lines.push("No new result files found".to_string());
    } else {
        lines.push(format!("Result files ({}):", report.results.len()));
        for result in &report.results {
            let name = result
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| result.path.display().to_string());
            match (&result.field, &result.color) {
                (Some(field), Some(color)) => {
                    lines.push(format!("  {name} -> {field} ({color})"));
                }
                _ => lines.push(format!("  {name} -> uncolored")),
            }
        }
    }

    ReportSummary { lines }
}
