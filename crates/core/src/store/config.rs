use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::StoreLayout;

/// File name of the instrumentation artifact searched for at wrap time.
pub const DEFAULT_TOOL_NAME: &str = "FuncTracer.so";

pub const ENV_PIN_ROOT: &str = "PIN_ROOT";
pub const ENV_TOOL_SEARCH_DIR: &str = "PIN_TOOL_SEARCH_DIR";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_SAFE_BIN_DIR: &str = "SAFE_BIN_DIR";
pub const ENV_DEBUG_ROOT: &str = "DEBUG_ROOT";

/// Settings shared by every wrap, unwrap, and status operation.
///
/// Missing fields in a config file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Root of the instrumentation host install; the host binary is `<pin_root>/pin`.
    pub pin_root: PathBuf,
    /// Directory tree searched for `tool_name`.
    pub tool_search_dir: PathBuf,
    /// File name of the instrumentation artifact.
    pub tool_name: String,
    /// Directory the launcher points engine logs at.
    pub log_dir: PathBuf,
    /// Directory holding original binaries while they are wrapped.
    pub safe_bin_dir: PathBuf,
    /// Root of the external debug store (`<debug_root>/.build-id/xx/rest.debug`).
    pub debug_root: PathBuf,
    /// Worker count for batch operations. `None` uses the available parallelism.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            pin_root: PathBuf::from("/opt/pin"),
            tool_search_dir: PathBuf::from("/usr/lib64/coverage-tools"),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            log_dir: PathBuf::from("/var/coverage/data"),
            safe_bin_dir: PathBuf::from("/var/coverage/bin"),
            debug_root: PathBuf::from("/usr/lib/debug"),
            jobs: None,
        }
    }
}

impl InstrumentConfig {
    /// Path of the instrumentation host executable.
    pub fn host_binary(&self) -> PathBuf {
        self.pin_root.join("pin")
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.safe_bin_dir)
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    ///
    /// The lookup is injected so callers (and tests) decide where variables
    /// come from.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_PIN_ROOT) {
            self.pin_root = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TOOL_SEARCH_DIR) {
            self.tool_search_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_LOG_DIR) {
            self.log_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_SAFE_BIN_DIR) {
            self.safe_bin_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_DEBUG_ROOT) {
            self.debug_root = PathBuf::from(v);
        }
    }
}

/// Load a config file from disk. `.yaml`/`.yml` parse as YAML, anything else as JSON.
pub fn load_config(path: &Path) -> Result<InstrumentConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
    let config = match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config YAML at {}", path.display()))?,
        _ => serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config JSON at {}", path.display()))?,
    };
    validate_config(&config)?;
    Ok(config)
}

/// Reject settings no operation can run with.
pub fn validate_config(config: &InstrumentConfig) -> Result<()> {
    if config.tool_name.trim().is_empty() {
        return Err(anyhow!("tool_name must not be empty"));
    }
    if config.jobs == Some(0) {
        return Err(anyhow!("jobs must be at least 1"));
    }
    Ok(())
}
