use std::path::{Path, PathBuf};

use anyhow::Result;
use funcov_core::services::wrap::{BatchError, BatchReport, UnwrapOutcome, WrapEngine, WrapOutcome};
use funcov_core::store::InstrumentConfig;

/// Wrap every path, printing one line per success and per failure.
pub fn wrap_command(config: InstrumentConfig, paths: &[PathBuf]) -> Result<()> {
    let engine = WrapEngine::new(config);
    finish_batch(engine.wrap_many(paths), print_wrapped)
}

/// Unwrap every path, printing one line per success and per failure.
pub fn unwrap_command(config: InstrumentConfig, paths: &[PathBuf]) -> Result<()> {
    let engine = WrapEngine::new(config);
    finish_batch(engine.unwrap_many(paths), print_unwrapped)
}

fn print_wrapped(path: &Path, outcome: &WrapOutcome) {
    println!(
        "wrapped {} (logical name: {}, backup: {}, debug info: {})",
        path.display(),
        outcome.logical_name,
        outcome.backup_path.display(),
        outcome.debug_info.describe()
    );
}

fn print_unwrapped(path: &Path, outcome: &UnwrapOutcome) {
    println!("unwrapped {} (restored {})", path.display(), outcome.real_path.display());
}

/// Successes print the same whether or not another path failed.
fn finish_batch<T>(
    result: Result<BatchReport<T>, BatchError<T>>,
    print: fn(&Path, &T),
) -> Result<()>
where
    T: std::fmt::Debug + Send + Sync + 'static,
{
    match result {
        Ok(report) => {
            for (path, outcome) in &report.items {
                print(path, outcome);
            }
            Ok(())
        }
        Err(batch) => {
            for (path, outcome) in &batch.succeeded.items {
                print(path, outcome);
            }
            for (path, err) in &batch.failures {
                eprintln!("error: {}: {err}", path.display());
            }
            Err(anyhow::Error::new(batch))
        }
    }
}
