//! Launcher script rendering and parsing.
//!
//! A launcher replaces a wrapped binary on disk. It records where the original
//! lives and re-executes it under the instrumentation host. Every value the
//! unwrap side needs is written as a `KEY="value"` assignment so it can be
//! read back without running the script.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Greppable marker identifying a path as currently wrapped.
pub const LAUNCHER_MARKER: &str = "funcov-launcher:";

const KEY_ORIGINAL_BINARY: &str = "ORIGINAL_BINARY";
const KEY_LOGICAL_NAME: &str = "LOGICAL_NAME";
const KEY_ORIGINAL_MODE: &str = "ORIGINAL_MODE";
const KEY_PIN_BIN: &str = "PIN_BIN";
const KEY_PIN_TOOL: &str = "PIN_TOOL";
const KEY_LOG_DIR: &str = "LOG_DIR";

/// Mode assumed when a launcher predates `ORIGINAL_MODE`.
const FALLBACK_MODE: u32 = 0o755;

/// Everything a launcher encodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherSpec {
    /// Name the binary was invoked under (the symlink name for multicall tools).
    pub logical_name: String,
    /// Safe-store location of the original binary.
    pub original_binary: PathBuf,
    /// Permission bits of the original binary before wrapping.
    pub original_mode: u32,
    /// Instrumentation host executable.
    pub host_binary: PathBuf,
    /// Instrumentation artifact loaded by the host.
    pub tool_path: PathBuf,
    /// Directory engine logs are written to, one `-logfile` per process.
    pub log_dir: PathBuf,
}

/// Render the launcher script for `spec`.
pub fn render_launcher(spec: &LauncherSpec) -> String {
    let mut out = String::new();
    out.push_str("#!/bin/sh\n");
    out.push_str(&format!(
        "# {LAUNCHER_MARKER} wrapped by funcov {}; restore with `funcov unwrap`\n",
        crate::version()
    ));
    let assignments = [
        (KEY_ORIGINAL_BINARY, spec.original_binary.to_string_lossy().to_string()),
        (KEY_LOGICAL_NAME, spec.logical_name.clone()),
        (KEY_ORIGINAL_MODE, format!("{:04o}", spec.original_mode)),
        (KEY_PIN_BIN, spec.host_binary.to_string_lossy().to_string()),
        (KEY_PIN_TOOL, spec.tool_path.to_string_lossy().to_string()),
        (KEY_LOG_DIR, spec.log_dir.to_string_lossy().to_string()),
    ];
    for (key, value) in assignments {
        out.push_str(&format!("{key}={}\n", quote(&value)));
    }
    out.push_str("mkdir -p \"$LOG_DIR\" 2>/dev/null\n");
    out.push_str(
        "exec \"$PIN_BIN\" -t \"$PIN_TOOL\" -logfile \"$LOG_DIR/$LOGICAL_NAME.$$.log\" \
         -- \"$ORIGINAL_BINARY\" \"$@\"\n",
    );
    out
}

/// Parse a launcher back into its spec.
///
/// Returns `None` when the marker is absent or a required assignment
/// (`ORIGINAL_BINARY`, `LOGICAL_NAME`) is missing or malformed.
pub fn parse_launcher(content: &str) -> Option<LauncherSpec> {
    if !content.contains(LAUNCHER_MARKER) {
        return None;
    }

    let mut original_binary = None;
    let mut logical_name = None;
    let mut original_mode = None;
    let mut host_binary = None;
    let mut tool_path = None;
    let mut log_dir = None;

    for line in content.lines() {
        let Some((key, raw)) = line.split_once('=') else { continue };
        let slot = match key.trim() {
            KEY_ORIGINAL_BINARY => &mut original_binary,
            KEY_LOGICAL_NAME => &mut logical_name,
            KEY_ORIGINAL_MODE => &mut original_mode,
            KEY_PIN_BIN => &mut host_binary,
            KEY_PIN_TOOL => &mut tool_path,
            KEY_LOG_DIR => &mut log_dir,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(unquote(raw.trim())?);
        }
    }

    let original_binary: String = original_binary.filter(|v: &String| !v.is_empty())?;
    let logical_name: String = logical_name.filter(|v: &String| !v.is_empty())?;
    let original_mode = match original_mode {
        Some(m) => u32::from_str_radix(&m, 8).ok()?,
        None => FALLBACK_MODE,
    };

    Some(LauncherSpec {
        logical_name,
        original_binary: PathBuf::from(original_binary),
        original_mode,
        host_binary: host_binary.map(PathBuf::from).unwrap_or_default(),
        tool_path: tool_path.map(PathBuf::from).unwrap_or_default(),
        log_dir: log_dir.map(PathBuf::from).unwrap_or_default(),
    })
}

/// Double-quote `value` for `sh`, escaping the characters still special inside quotes.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            other => out.push(other),
        }
    }
    Some(out)
}
