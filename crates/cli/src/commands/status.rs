use std::path::PathBuf;

use anyhow::{Context, Result};
use funcov_core::services::wrap::{TargetStatus, WrapEngine};
use funcov_core::store::InstrumentConfig;

/// Print wrap state and debug-info verdict for each path.
///
/// A path that cannot be inspected (missing, unreadable) is reported and
/// makes the command fail after every path has been shown.
pub fn status_command(config: InstrumentConfig, paths: &[PathBuf], json: bool) -> Result<()> {
    let engine = WrapEngine::new(config);
    let mut statuses: Vec<TargetStatus> = Vec::new();
    let mut failed = 0usize;
    for path in paths {
        match engine.status(path) {
            Ok(status) => statuses.push(status),
            Err(err) => {
                eprintln!("error: {}: {err}", path.display());
                failed += 1;
            }
        }
    }

    if json {
        let out = serde_json::to_string_pretty(&statuses).context("Failed to serialize status")?;
        println!("{out}");
    } else {
        for status in &statuses {
            print_status(status);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} paths could not be inspected", paths.len());
    }
    Ok(())
}

fn print_status(status: &TargetStatus) {
    println!("{}: {}", status.path.display(), status.state);
    if status.real_path != status.path {
        println!("  real path:  {}", status.real_path.display());
        println!("  logical:    {}", status.logical_name);
    }
    if let Some(backup) = &status.backup_path {
        println!("  backup:     {}", backup.display());
    }
    if let Some(debug) = &status.debug_info {
        println!("  debug info: {}", debug.describe());
    }
}
