//! Engine log aggregation.
//!
//! The instrumentation engine appends lines such as
//! `[Image:/usr/bin/calc] [Function:sum]` (declaration) and
//! `[Image:/usr/bin/calc] [Called:sum]` (call observed). Any other line,
//! including future event kinds, is skipped.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::model::CoverageData;
use crate::services::demangle::demangle_symbol;

/// Per-image coverage keyed by image name.
pub type CoverageMap = BTreeMap<String, CoverageData>;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Could not open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read log file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No .log files found in directory {0}")]
    NoLogFiles(PathBuf),
}

/// One recognized log event. Names are trimmed but not yet demangled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent<'a> {
    Declared { image: &'a str, function: &'a str },
    Called { image: &'a str, function: &'a str },
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[Image:(.*?)\] \[Function:(.*?)\]").expect("declaration pattern is valid")
    })
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[Image:(.*?)\] \[Called:(.*?)\]").expect("call pattern is valid")
    })
}

/// Recognize a single log line.
///
/// Returns `None` for unrecognized lines and for lines whose image or
/// function is empty after trimming.
pub fn parse_line(line: &str) -> Option<LogEvent<'_>> {
    let (caps, declared) = match declaration_re().captures(line) {
        Some(caps) => (caps, true),
        None => (call_re().captures(line)?, false),
    };
    let image = caps.get(1)?.as_str().trim();
    let function = caps.get(2)?.as_str().trim();
    if image.is_empty() || function.is_empty() {
        return None;
    }
    Some(if declared {
        LogEvent::Declared { image, function }
    } else {
        LogEvent::Called { image, function }
    })
}

/// Fold one event into `coverage`, creating the image entry on first sight.
pub fn record_event(coverage: &mut CoverageMap, event: LogEvent<'_>) {
    match event {
        LogEvent::Declared { image, function } => coverage
            .entry(image.to_string())
            .or_default()
            .record_declared(demangle_symbol(function)),
        LogEvent::Called { image, function } => coverage
            .entry(image.to_string())
            .or_default()
            .record_called(demangle_symbol(function)),
    }
}

/// Aggregate every line from `reader` into `coverage`.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected. Returns
/// the number of skipped lines.
pub fn ingest_reader<R: BufRead>(mut reader: R, coverage: &mut CoverageMap) -> io::Result<usize> {
    let mut buf = Vec::new();
    let mut skipped = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        match parse_line(line) {
            Some(event) => record_event(coverage, event),
            None => skipped += 1,
        }
    }
    Ok(skipped)
}

/// Parse every log file into per-image coverage.
///
/// A file that cannot be opened or read fails the whole call, naming the
/// file. An empty list yields an empty map.
pub fn analyze_logs<P: AsRef<Path>>(paths: &[P]) -> Result<CoverageMap, CoverageError> {
    let mut coverage = CoverageMap::new();
    for path in paths {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| CoverageError::Open { path: path.to_path_buf(), source })?;
        let skipped = ingest_reader(BufReader::new(file), &mut coverage)
            .map_err(|source| CoverageError::Read { path: path.to_path_buf(), source })?;
        debug!(log = %path.display(), skipped, "ingested coverage log");
    }
    Ok(coverage)
}

/// Expand a report input argument into log file paths.
///
/// A directory yields its `*.log` files in name order (error if there are
/// none); anything else is treated as a comma-separated list of files.
pub fn collect_log_inputs(arg: &str) -> Result<Vec<PathBuf>, CoverageError> {
    let as_path = Path::new(arg);
    if as_path.is_dir() {
        let entries = fs::read_dir(as_path)
            .map_err(|source| CoverageError::ReadDir { path: as_path.to_path_buf(), source })?;
        let mut logs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "log"))
            .collect();
        logs.sort();
        if logs.is_empty() {
            return Err(CoverageError::NoLogFiles(as_path.to_path_buf()));
        }
        return Ok(logs);
    }
    Ok(arg.split(',').map(str::trim).filter(|s| !s.is_empty()).map(PathBuf::from).collect())
}
