//! Debug-info resolution: embedded DWARF first, then an external store keyed
//! by the GNU build-id.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use goblin::elf::note::{Note, NT_GNU_BUILD_ID};
use goblin::elf::Elf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::BinaryIdentity;
use crate::store::external_debug_path;

/// Sections whose presence means line-accurate attribution is possible.
const EMBEDDED_DEBUG_SECTIONS: &[&str] = &[".debug_info", ".zdebug_info"];

#[derive(Debug, Error)]
pub enum DebugInfoError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse ELF {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Where (if anywhere) debug metadata for a binary was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DebugInfoStatus {
    /// A `.debug_info` section is present in the file itself.
    Embedded,
    /// A separate debug file exists at the build-id derived path.
    External(PathBuf),
    /// Neither embedded nor external metadata was found.
    Missing,
    /// The binary could not be inspected; set by callers that downgrade
    /// resolver errors to a warning.
    Unreadable(String),
}

impl DebugInfoStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, DebugInfoStatus::Embedded | DebugInfoStatus::External(_))
    }

    pub fn describe(&self) -> String {
        match self {
            DebugInfoStatus::Embedded => "embedded".to_string(),
            DebugInfoStatus::External(path) => format!("external ({})", path.display()),
            DebugInfoStatus::Missing => "missing".to_string(),
            DebugInfoStatus::Unreadable(reason) => format!("unreadable ({reason})"),
        }
    }
}

/// Can coverage for `path` be attributed to source lines?
pub fn has_debug_info(path: &Path, debug_root: &Path) -> Result<bool, DebugInfoError> {
    Ok(resolve_debug_info(path, debug_root)?.is_available())
}

/// Two-tier lookup: embedded sections, then `<debug_root>/.build-id/xx/rest.debug`.
///
/// A missing external file is a normal negative answer; any other filesystem
/// error while probing it propagates.
pub fn resolve_debug_info(
    path: &Path,
    debug_root: &Path,
) -> Result<DebugInfoStatus, DebugInfoError> {
    let bytes = read_binary(path)?;
    let elf = parse_elf(path, &bytes)?;

    if has_embedded_debug(&elf) {
        return Ok(DebugInfoStatus::Embedded);
    }

    let Some(identity) = elf_build_id(&elf, &bytes) else {
        return Ok(DebugInfoStatus::Missing);
    };
    let Some(external) = external_debug_path(debug_root, &identity) else {
        return Ok(DebugInfoStatus::Missing);
    };

    match fs::metadata(&external) {
        Ok(meta) if meta.is_file() => Ok(DebugInfoStatus::External(external)),
        Ok(_) => Ok(DebugInfoStatus::Missing),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(DebugInfoStatus::Missing),
        Err(source) => Err(DebugInfoError::Io { path: external, source }),
    }
}

/// Extract the build-id fingerprint of the ELF file at `path`, if it has one.
pub fn build_id(path: &Path) -> Result<Option<BinaryIdentity>, DebugInfoError> {
    let bytes = read_binary(path)?;
    let elf = parse_elf(path, &bytes)?;
    Ok(elf_build_id(&elf, &bytes))
}

fn read_binary(path: &Path) -> Result<Vec<u8>, DebugInfoError> {
    fs::read(path).map_err(|source| DebugInfoError::Io { path: path.to_path_buf(), source })
}

fn parse_elf<'a>(path: &Path, bytes: &'a [u8]) -> Result<Elf<'a>, DebugInfoError> {
    Elf::parse(bytes)
        .map_err(|e| DebugInfoError::Parse { path: path.to_path_buf(), reason: e.to_string() })
}

fn has_embedded_debug(elf: &Elf) -> bool {
    elf.section_headers.iter().any(|sh| {
        let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("");
        EMBEDDED_DEBUG_SECTIONS.contains(&name)
    })
}

/// Look for a GNU build-id note in note sections, then in `PT_NOTE` segments.
fn elf_build_id(elf: &Elf, bytes: &[u8]) -> Option<BinaryIdentity> {
    elf.iter_note_sections(bytes, None)
        .and_then(gnu_build_id)
        .or_else(|| elf.iter_note_headers(bytes).and_then(gnu_build_id))
}

// Stops at the first malformed note rather than skipping it.
fn gnu_build_id<'a>(
    notes: impl Iterator<Item = goblin::error::Result<Note<'a>>>,
) -> Option<BinaryIdentity> {
    notes
        .map_while(Result::ok)
        .find(|n| n.n_type == NT_GNU_BUILD_ID && n.name == "GNU" && !n.desc.is_empty())
        .map(|n| BinaryIdentity::new(n.desc))
}
