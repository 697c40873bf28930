use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use funcov_core::services::coverage::{analyze_logs, collect_log_inputs, CoverageMap};
use funcov_core::services::report::{build_json_report, render_image_text, render_text, safe_report_name};

/// Report output format.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable text
    #[default]
    #[value(name = "txt")]
    Text,
    /// JSON summary with per-image function lists
    Json,
}

/// Expand every input argument into log files, in argument order.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    for input in inputs {
        let expanded = collect_log_inputs(input)
            .with_context(|| format!("Failed to expand report input '{input}'"))?;
        logs.extend(expanded);
    }
    Ok(logs)
}

/// Aggregate logs and print or write the coverage report.
pub fn report_command(inputs: &[String], format: ReportFormat, output: Option<&Path>) -> Result<()> {
    let logs = expand_inputs(inputs)?;
    let coverage = analyze_logs(&logs).context("Failed to analyze coverage logs")?;
    if coverage.is_empty() {
        eprintln!("warning: no coverage events found in {} log file(s)", logs.len());
    }

    match output {
        None => match format {
            ReportFormat::Text => print!("{}", render_text(&coverage)),
            ReportFormat::Json => println!("{}", json_string(&coverage)?),
        },
        Some(dir) => {
            let written = write_reports(&coverage, format, dir)?;
            for path in written {
                println!("wrote {}", path.display());
            }
        }
    }
    Ok(())
}

/// Write report files into `dir`, returning the paths written.
///
/// Text produces one `<image>.txt` per image plus an aggregate `coverage.txt`;
/// JSON produces a single `coverage.json`.
pub fn write_reports(coverage: &CoverageMap, format: ReportFormat, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    let mut written = Vec::new();
    match format {
        ReportFormat::Json => {
            let path = dir.join("coverage.json");
            write_file(&path, &json_string(coverage)?)?;
            written.push(path);
        }
        ReportFormat::Text => {
            for image in coverage.keys() {
                let Some(text) = render_image_text(image, coverage) else { continue };
                let path = dir.join(format!("{}.txt", safe_report_name(image)));
                write_file(&path, &text)?;
                written.push(path);
            }
            let path = dir.join("coverage.txt");
            write_file(&path, &render_text(coverage))?;
            written.push(path);
        }
    }
    Ok(written)
}

fn json_string(coverage: &CoverageMap) -> Result<String> {
    serde_json::to_string_pretty(&build_json_report(coverage)).context("Failed to serialize report")
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
