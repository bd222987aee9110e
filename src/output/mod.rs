use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::AnalysisReport;

/// Render a report in the requested format
pub fn render(report: &AnalysisReport, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(report)),
        OutputFormat::Json => format_as_json(report),
        OutputFormat::Markdown => Ok(format_as_markdown(report)),
    }
}

/// Save report to file
pub async fn save_to_file(report: &AnalysisReport, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content).context("Failed to write report")?;
    Ok(())
}

/// Print report to console
pub fn print_to_console(report: &AnalysisReport, format: &OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}

fn format_as_text(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Video: {}\n", report.video_url));
    out.push_str(&format!(
        "Frames: {} extracted, {} analyzed\n",
        report.frames_extracted, report.frames_analyzed
    ));
    out.push_str(&format!("Completed: {}\n", report.completed_at.format("%Y-%m-%d %H:%M:%S UTC")));

    for (title, body) in sections(report) {
        out.push('\n');
        out.push_str(&title.to_uppercase());
        out.push('\n');
        out.push_str(&"=".repeat(title.len()));
        out.push('\n');
        out.push_str(body.trim());
        out.push('\n');
    }

    out
}

fn format_as_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

fn format_as_markdown(report: &AnalysisReport) -> String {
    let mut out = String::from("# Video Analysis\n\n");
    out.push_str(&format!("- **Video:** <{}>\n", report.video_url));
    out.push_str(&format!(
        "- **Frames:** {} extracted, {} analyzed\n",
        report.frames_extracted, report.frames_analyzed
    ));
    out.push_str(&format!("- **Completed:** {}\n", report.completed_at.to_rfc3339()));

    for (title, body) in sections(report) {
        out.push_str(&format!("\n## {}\n\n{}\n", title, body.trim()));
    }

    out
}

fn sections(report: &AnalysisReport) -> [(&'static str, &str); 3] {
    [
        ("Transcript", report.transcript.as_str()),
        ("Visual Analysis", report.visual_analysis.as_str()),
        ("Final Analysis", report.final_analysis.as_str()),
    ]
}
