//! Wrap/unwrap engine.
//!
//! Wrapping moves a binary into the safe store and puts a launcher at its
//! path; unwrapping moves it back. Whether a path is wrapped is decided only
//! by what is on disk (the launcher marker), so the engine keeps no state
//! between runs.
//!
//! Symlinks are resolved exactly one level: the symlink's own name is the
//! *logical* name the user invokes, its target is the *real* path that gets
//! rewritten. Multicall binaries keep their invocation name because the
//! backup is stored under the logical name.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::WrapState;
use crate::services::classify::{carries_launcher_marker, classify_path, is_supported_binary};
use crate::services::debuginfo::{resolve_debug_info, DebugInfoStatus};
use crate::services::launcher::{parse_launcher, render_launcher, LauncherSpec};
use crate::store::{InstrumentConfig, StoreLayout};

const LAUNCHER_MODE: u32 = 0o755;

#[derive(Debug, Error)]
pub enum WrapError {
    #[error("{0} is already wrapped")]
    AlreadyWrapped(PathBuf),
    #[error("{0} is not wrapped")]
    NotWrapped(PathBuf),
    #[error("{0} is not a supported ELF binary")]
    NotSupported(PathBuf),
    #[error("Launcher at {0} could not be parsed")]
    MalformedLauncher(PathBuf),
    #[error("Backup for {path} is missing at {backup}; the launcher is orphaned")]
    MissingBackup { path: PathBuf, backup: PathBuf },
    #[error("A backup already exists at {backup}; refusing to overwrite it while wrapping {path}")]
    BackupExists { path: PathBuf, backup: PathBuf },
    #[error("Launcher values for {0} cannot be encoded (newline in a path or name)")]
    Unencodable(PathBuf),
    #[error("{tool} not found under {search_dir}")]
    ToolNotFound { tool: String, search_dir: PathBuf },
    #[error("Failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{cause}; restoring {path} from {backup} also failed: {rollback}")]
    RollbackFailed { path: PathBuf, backup: PathBuf, cause: Box<WrapError>, rollback: io::Error },
}

impl WrapError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        WrapError::Io { op, path: path.to_path_buf(), source }
    }
}

/// A user-supplied path after one level of symlink resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    /// Name the binary is invoked under.
    pub logical_name: String,
    /// File that is actually rewritten.
    pub real_path: PathBuf,
    pub via_symlink: bool,
}

/// Result of a successful `wrap`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrapOutcome {
    pub logical_name: String,
    pub real_path: PathBuf,
    pub backup_path: PathBuf,
    pub launcher: LauncherSpec,
    pub debug_info: DebugInfoStatus,
}

/// Result of a successful `unwrap`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnwrapOutcome {
    pub logical_name: String,
    pub real_path: PathBuf,
    pub backup_path: PathBuf,
}

/// Read-only view of a target, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatus {
    pub path: PathBuf,
    pub logical_name: String,
    pub real_path: PathBuf,
    pub state: WrapState,
    /// Present for wrapped targets.
    pub backup_path: Option<PathBuf>,
    /// Resolved against the binary itself, or its backup when wrapped.
    pub debug_info: Option<DebugInfoStatus>,
}

/// Successful items of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub items: Vec<(PathBuf, T)>,
}

/// A batch where at least one item failed. Every other item was still applied
/// and its outcome is kept in `succeeded`.
#[derive(Debug, Error)]
#[error("{} of {} paths failed", .failures.len(), .failures.len() + .succeeded.items.len())]
pub struct BatchError<T> {
    pub succeeded: BatchReport<T>,
    pub failures: Vec<(PathBuf, WrapError)>,
}

/// Resolve `path` through at most one symlink.
pub fn resolve_target(path: &Path) -> Result<ResolvedTarget, WrapError> {
    let logical_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| WrapError::NotSupported(path.to_path_buf()))?;
    let meta = fs::symlink_metadata(path).map_err(|e| WrapError::io("inspect", path, e))?;
    if !meta.file_type().is_symlink() {
        return Ok(ResolvedTarget { logical_name, real_path: path.to_path_buf(), via_symlink: false });
    }
    let target = fs::read_link(path).map_err(|e| WrapError::io("read symlink", path, e))?;
    let real_path = if target.is_absolute() { target } else { parent_dir(path).join(target) };
    Ok(ResolvedTarget { logical_name, real_path, via_symlink: true })
}

/// Depth-first search of `search_dir` for a file named `tool_name`.
///
/// Entries are visited in name order and files in a directory are checked
/// before its subdirectories. Symlinked directories are not followed.
pub fn find_tool(search_dir: &Path, tool_name: &str) -> Result<PathBuf, WrapError> {
    let not_found =
        || WrapError::ToolNotFound { tool: tool_name.to_string(), search_dir: search_dir.to_path_buf() };
    let mut pending = vec![search_dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        let mut entries: Vec<fs::DirEntry> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let Ok(file_type) = entry.file_type() else { continue };
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else if entry.file_name() == tool_name {
                return Ok(entry.path());
            }
        }
        // Reverse so the stack pops subdirectories in name order.
        pending.extend(subdirs.into_iter().rev());
    }
    Err(not_found())
}

/// The wrap/unwrap engine, bound to one configuration.
#[derive(Debug, Clone)]
pub struct WrapEngine {
    config: InstrumentConfig,
    layout: StoreLayout,
}

impl WrapEngine {
    pub fn new(config: InstrumentConfig) -> Self {
        let layout = config.layout();
        Self { config, layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Replace the binary at `path` (or its symlink target) with a launcher.
    pub fn wrap(&self, path: &Path) -> Result<WrapOutcome, WrapError> {
        let target = resolve_target(path)?;
        let real = &target.real_path;

        if carries_launcher_marker(real) {
            return Err(WrapError::AlreadyWrapped(real.clone()));
        }
        if !is_supported_binary(real) {
            return Err(WrapError::NotSupported(real.clone()));
        }

        let debug_info = resolve_debug_info(real, &self.config.debug_root)
            .unwrap_or_else(|e| DebugInfoStatus::Unreadable(e.to_string()));
        if !debug_info.is_available() {
            warn!(
                binary = %real.display(),
                debug_info = %debug_info.describe(),
                "no debug info; coverage will carry symbol names only"
            );
        }

        let original_mode = fs::metadata(real)
            .map_err(|e| WrapError::io("inspect", real, e))?
            .permissions()
            .mode()
            & 0o7777;

        let backup = self.layout.backup_path(&canonical_or_self(real), &target.logical_name);
        if fs::symlink_metadata(&backup).is_ok() {
            return Err(WrapError::BackupExists { path: real.clone(), backup });
        }
        let backup_dir = parent_dir(&backup);
        fs::create_dir_all(&backup_dir)
            .map_err(|e| WrapError::io("create safe-store directory", &backup_dir, e))?;

        match move_without_overwrite(real, &backup) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WrapError::BackupExists { path: real.clone(), backup });
            }
            Err(e) => return Err(WrapError::io("move into safe store", real, e)),
        }

        let launcher = match self.install_launcher(&target, &backup, original_mode) {
            Ok(launcher) => launcher,
            Err(cause) => return Err(roll_back(real, &backup, cause)),
        };

        info!(
            path = %path.display(),
            real = %real.display(),
            logical = %target.logical_name,
            backup = %backup.display(),
            "wrapped binary"
        );
        Ok(WrapOutcome {
            logical_name: target.logical_name,
            real_path: target.real_path.clone(),
            backup_path: backup,
            launcher,
            debug_info,
        })
    }

    /// Restore the original binary behind the launcher at `path` (or its symlink target).
    pub fn unwrap(&self, path: &Path) -> Result<UnwrapOutcome, WrapError> {
        let target = resolve_target(path)?;
        let real = &target.real_path;

        if !carries_launcher_marker(real) {
            return Err(WrapError::NotWrapped(real.clone()));
        }
        let content = fs::read_to_string(real).map_err(|e| WrapError::io("read launcher", real, e))?;
        let spec = parse_launcher(&content).ok_or_else(|| WrapError::MalformedLauncher(real.clone()))?;
        let backup = spec.original_binary.clone();

        match fs::symlink_metadata(&backup) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(WrapError::MissingBackup { path: real.clone(), backup });
            }
            Err(e) => return Err(WrapError::io("inspect backup", &backup, e)),
        }

        move_file(&backup, real).map_err(|e| WrapError::io("restore from safe store", real, e))?;
        fs::set_permissions(real, fs::Permissions::from_mode(spec.original_mode))
            .map_err(|e| WrapError::io("restore permissions of", real, e))?;
        remove_if_empty(&parent_dir(&backup));

        info!(
            path = %path.display(),
            real = %real.display(),
            logical = %spec.logical_name,
            "unwrapped binary"
        );
        Ok(UnwrapOutcome {
            logical_name: spec.logical_name,
            real_path: target.real_path.clone(),
            backup_path: backup,
        })
    }

    /// Current state of `path` without modifying anything.
    pub fn status(&self, path: &Path) -> Result<TargetStatus, WrapError> {
        let target = resolve_target(path)?;
        let real = &target.real_path;
        let state = classify_path(real);

        let backup_path = match state {
            WrapState::Wrapped => fs::read_to_string(real)
                .ok()
                .and_then(|content| parse_launcher(&content))
                .map(|spec| spec.original_binary),
            _ => None,
        };
        let inspected = match state {
            WrapState::Unwrapped => Some(real.clone()),
            WrapState::Wrapped => backup_path.clone().filter(|b| is_supported_binary(b)),
            WrapState::Unknown => None,
        };
        let debug_info = inspected.map(|binary| {
            resolve_debug_info(&binary, &self.config.debug_root)
                .unwrap_or_else(|e| DebugInfoStatus::Unreadable(e.to_string()))
        });

        Ok(TargetStatus {
            path: path.to_path_buf(),
            logical_name: target.logical_name,
            real_path: target.real_path.clone(),
            state,
            backup_path,
            debug_info,
        })
    }

    /// Wrap every path; one failure never stops the others.
    pub fn wrap_many(
        &self,
        paths: &[PathBuf],
    ) -> Result<BatchReport<WrapOutcome>, BatchError<WrapOutcome>> {
        self.run_batch(paths, |p| self.wrap(p))
    }

    /// Unwrap every path; one failure never stops the others.
    pub fn unwrap_many(
        &self,
        paths: &[PathBuf],
    ) -> Result<BatchReport<UnwrapOutcome>, BatchError<UnwrapOutcome>> {
        self.run_batch(paths, |p| self.unwrap(p))
    }

    fn install_launcher(
        &self,
        target: &ResolvedTarget,
        backup: &Path,
        original_mode: u32,
    ) -> Result<LauncherSpec, WrapError> {
        let tool_path = find_tool(&self.config.tool_search_dir, &self.config.tool_name)?;
        let spec = LauncherSpec {
            logical_name: target.logical_name.clone(),
            original_binary: backup.to_path_buf(),
            original_mode,
            host_binary: self.config.host_binary(),
            tool_path,
            log_dir: self.config.log_dir.clone(),
        };
        let script = render_launcher(&spec);
        if parse_launcher(&script).as_ref() != Some(&spec) {
            return Err(WrapError::Unencodable(target.real_path.clone()));
        }
        write_launcher(&target.real_path, &script)?;
        Ok(spec)
    }

    fn run_batch<T, F>(&self, paths: &[PathBuf], op: F) -> Result<BatchReport<T>, BatchError<T>>
    where
        T: Send,
        F: Fn(&Path) -> Result<T, WrapError> + Sync,
    {
        let apply = || -> Vec<(PathBuf, Result<T, WrapError>)> {
            paths.par_iter().map(|p| (p.clone(), op(p.as_path()))).collect()
        };
        let results = match self.config.jobs {
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(apply),
                Err(e) => {
                    warn!(jobs, error = %e, "could not build worker pool; running on the global pool");
                    apply()
                }
            },
            None => apply(),
        };

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(value) => items.push((path, value)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "batch item failed");
                    failures.push((path, e));
                }
            }
        }
        if failures.is_empty() {
            Ok(BatchReport { items })
        } else {
            Err(BatchError { succeeded: BatchReport { items }, failures })
        }
    }
}

/// Put the backup back after a failed launcher install.
fn roll_back(real: &Path, backup: &Path, cause: WrapError) -> WrapError {
    warn!(path = %real.display(), error = %cause, "launcher install failed; restoring original");
    match move_file(backup, real) {
        Ok(()) => {
            remove_if_empty(&parent_dir(backup));
            cause
        }
        Err(rollback) => WrapError::RollbackFailed {
            path: real.to_path_buf(),
            backup: backup.to_path_buf(),
            cause: Box::new(cause),
            rollback,
        },
    }
}

/// Write `script` next to `real` and rename it into place.
fn write_launcher(real: &Path, script: &str) -> Result<(), WrapError> {
    let dir = parent_dir(real);
    let mut tmp = tempfile::Builder::new()
        .prefix(".funcov-launcher-")
        .tempfile_in(&dir)
        .map_err(|e| WrapError::io("create launcher in", &dir, e))?;
    tmp.write_all(script.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| WrapError::io("write launcher", tmp.path(), e))?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(LAUNCHER_MODE))
        .map_err(|e| WrapError::io("set permissions on", tmp.path(), e))?;
    tmp.persist(real).map_err(|e| WrapError::io("install launcher at", real, e.error))?;
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Move `from` to `to`, failing with `AlreadyExists` instead of replacing `to`.
///
/// Hard link then unlink; across filesystems, copy into a newly created file.
fn move_without_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => fs::remove_file(from),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            let mode = fs::metadata(from)?.permissions();
            let mut src = fs::File::open(from)?;
            let mut dst = fs::OpenOptions::new().write(true).create_new(true).open(to)?;
            let copied = io::copy(&mut src, &mut dst)
                .and_then(|_| dst.sync_all())
                .and_then(|()| dst.set_permissions(mode));
            if let Err(e) = copied {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

fn remove_if_empty(dir: &Path) {
    // Fails harmlessly when other backups still live here.
    let _ = fs::remove_dir(dir);
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
