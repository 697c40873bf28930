//! Text and JSON renderings of coverage results.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::services::coverage::CoverageMap;
use crate::services::summary::{summarize, CoverageSummary, ImageSummary};

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

/// Called and uncalled function lists for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetail {
    pub image: String,
    pub called: Vec<String>,
    pub uncalled: Vec<String>,
}

/// Machine-readable report: summary plus per-image function lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
    pub generated_at: String,
    pub summary: CoverageSummary,
    pub images: Vec<ImageDetail>,
}

pub fn build_json_report(coverage: &CoverageMap) -> JsonReport {
    let images = coverage
        .iter()
        .map(|(image, data)| ImageDetail {
            image: image.clone(),
            called: data.called_functions.iter().cloned().collect(),
            uncalled: data.uncalled().map(str::to_string).collect(),
        })
        .collect();
    JsonReport { generated_at: Utc::now().to_rfc3339(), summary: summarize(coverage), images }
}

/// Console report: one block per image, then totals.
pub fn render_text(coverage: &CoverageMap) -> String {
    let summary = summarize(coverage);
    let mut out = String::new();
    for row in &summary.rows {
        render_image_block(&mut out, row, coverage);
    }
    render_totals(&mut out, &summary);
    out
}

/// Text block for a single image, as written to per-image report files.
pub fn render_image_text(image: &str, coverage: &CoverageMap) -> Option<String> {
    let summary = summarize(coverage);
    let row = summary.rows.iter().find(|r| r.image == image)?;
    let mut out = String::new();
    render_image_block(&mut out, row, coverage);
    Some(out)
}

fn render_image_block(out: &mut String, row: &ImageSummary, coverage: &CoverageMap) {
    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "Image: {}", row.image);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  Functions Found:   {}", row.total);
    let _ = writeln!(out, "  Functions Called:  {}", row.called);
    let _ = writeln!(out, "  Coverage:          {:.2}%", row.coverage_pct);
    let _ = writeln!(out, "{THIN_RULE}");

    let Some(data) = coverage.get(&row.image) else { return };
    if data.called_functions.is_empty() {
        let _ = writeln!(out, "  No functions were called for this image.");
    } else {
        let _ = writeln!(out, "  Called Functions:");
        for function in &data.called_functions {
            let _ = writeln!(out, "    - {function}");
        }
    }
    let mut uncalled = data.uncalled().peekable();
    if uncalled.peek().is_some() {
        let _ = writeln!(out, "\n  Uncalled Functions:");
        for function in uncalled {
            let _ = writeln!(out, "    - {function}");
        }
    }
}

fn render_totals(out: &mut String, summary: &CoverageSummary) {
    let _ = writeln!(out, "\n==================== Totals ======================");
    let _ = writeln!(out, "  Total Functions:   {}", summary.total_functions);
    let _ = writeln!(out, "  Total Called:      {}", summary.total_called);
    let _ = writeln!(out, "  Average Coverage:  {:.2}%", summary.average_coverage);
    let _ = writeln!(out, "{RULE}");
}

/// File-name-safe report stem: the image's base name with every character
/// outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn safe_report_name(image: &str) -> String {
    let base = Path::new(image).file_name().and_then(|n| n.to_str()).unwrap_or(image);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_report_name_uses_base_name_and_replaces_specials() {
        assert_eq!(safe_report_name("/some/long/path/mybinary"), "mybinary");
        assert_eq!(safe_report_name("lib c++ (x).so"), "lib_c____x_.so");
        assert_eq!(safe_report_name(""), "image");
    }
}
