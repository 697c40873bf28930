use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use funcov_core::store::{load_config, validate_config, InstrumentConfig};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "FUNCOV_LOG";

/// Per-invocation overrides. These win over the config file and the environment.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Directory holding original binaries while they are wrapped.
    #[arg(long)]
    pub safe_bin_dir: Option<PathBuf>,

    /// Directory tree searched for the instrumentation artifact.
    #[arg(long)]
    pub tool_search_dir: Option<PathBuf>,

    /// File name of the instrumentation artifact.
    #[arg(long)]
    pub tool_name: Option<String>,

    /// Root of the instrumentation host install.
    #[arg(long)]
    pub pin_root: Option<PathBuf>,

    /// Directory wrapped binaries write their logs to.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Root of the external debug store.
    #[arg(long)]
    pub debug_root: Option<PathBuf>,

    /// Worker count for batch operations.
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut InstrumentConfig) {
        if let Some(v) = &self.safe_bin_dir {
            config.safe_bin_dir = v.clone();
        }
        if let Some(v) = &self.tool_search_dir {
            config.tool_search_dir = v.clone();
        }
        if let Some(v) = &self.tool_name {
            config.tool_name = v.clone();
        }
        if let Some(v) = &self.pin_root {
            config.pin_root = v.clone();
        }
        if let Some(v) = &self.log_dir {
            config.log_dir = v.clone();
        }
        if let Some(v) = &self.debug_root {
            config.debug_root = v.clone();
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
    }
}

/// Build the effective config: defaults, then the config file, then the
/// process environment, then command-line overrides.
pub fn build_config(config_path: Option<&Path>, overrides: &ConfigOverrides) -> Result<InstrumentConfig> {
    let mut config = match config_path {
        Some(path) => load_config(path)?,
        None => InstrumentConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    overrides.apply(&mut config);
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Filter directive for a `-v` count: warn, then info, then debug.
pub fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the stderr log subscriber.
///
/// `FUNCOV_LOG` is honored when no `-v` flag is given. Safe to call twice;
/// the second call is a no-op.
pub fn init_tracing(verbose: u8) {
    let fallback = verbosity_filter(verbose);
    let filter = if verbose == 0 {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback))
    } else {
        EnvFilter::new(fallback)
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
