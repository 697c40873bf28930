//! Per-image and aggregate coverage statistics.

use serde::{Deserialize, Serialize};

use crate::services::coverage::CoverageMap;

/// Coverage numbers for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub image: String,
    pub total: usize,
    pub called: usize,
    pub coverage_pct: f64,
}

/// Rows sorted by image name plus totals across all images.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub rows: Vec<ImageSummary>,
    pub total_functions: usize,
    pub total_called: usize,
    /// `total_called / total_functions * 100` over all images combined, so
    /// larger images weigh more than small ones.
    pub average_coverage: f64,
}

/// `called / total * 100`, or 0 when there is nothing to cover.
pub fn coverage_pct(called: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        called as f64 / total as f64 * 100.0
    }
}

/// Summarize every image in `coverage`. Recomputed on each call.
pub fn summarize(coverage: &CoverageMap) -> CoverageSummary {
    let mut summary = CoverageSummary::default();
    // BTreeMap iteration is already sorted by image name.
    for (image, data) in coverage {
        let total = data.total_functions.len();
        let called = data.called_functions.len();
        summary.rows.push(ImageSummary {
            image: image.clone(),
            total,
            called,
            coverage_pct: coverage_pct(called, total),
        });
        summary.total_functions += total;
        summary.total_called += called;
    }
    summary.average_coverage = coverage_pct(summary.total_called, summary.total_functions);
    summary
}
