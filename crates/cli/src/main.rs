use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use funcov::{
    build_config, init_tracing, report_command, status_command, unwrap_command, wrap_command,
    ConfigOverrides, ReportFormat,
};

/// Function-coverage lifecycle manager.
///
/// This CLI is a thin wrapper around `funcov-core`. All substantive logic
/// lives in the library so it can be tested thoroughly and reused from other
/// frontends.
#[derive(Parser, Debug)]
#[command(
    name = "funcov",
    version,
    about = "Wrap ELF binaries with a coverage launcher and report on the results",
    long_about = None
)]
struct Cli {
    /// JSON or YAML config file. Environment variables and flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv). `FUNCOV_LOG` applies when absent.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace binaries with instrumentation launchers.
    ///
    /// Each original is moved into the safe store. Symlinks are followed one
    /// level; the symlink's name is kept as the invocation name.
    Wrap {
        /// Binaries (or symlinks to binaries) to wrap.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Restore wrapped binaries from the safe store.
    Unwrap {
        /// Launchers (or symlinks to them) to unwrap.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Show wrap state and debug-info availability.
    Status {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Aggregate engine logs into a coverage report.
    Report {
        /// Log directories (all `*.log` files) or comma-separated log files.
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Report format.
        #[arg(short, long, value_enum, default_value = "txt")]
        format: ReportFormat,

        /// Write report files into this directory instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Wrap { paths, overrides } => {
            wrap_command(build_config(config_path, &overrides)?, &paths)?
        }
        Command::Unwrap { paths, overrides } => {
            unwrap_command(build_config(config_path, &overrides)?, &paths)?
        }
        Command::Status { paths, json, overrides } => {
            status_command(build_config(config_path, &overrides)?, &paths, json)?
        }
        Command::Report { inputs, format, output } => {
            report_command(&inputs, format, output.as_deref())?
        }
    }

    Ok(())
}
