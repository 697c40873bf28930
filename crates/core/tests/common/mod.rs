//! Shared fixtures for core integration tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use funcov_core::store::InstrumentConfig;
use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use tempfile::TempDir;

pub const TOOL_NAME: &str = "FuncTracer.so";

/// Minimal x86_64 ELF object, optionally with `.debug_info` and a GNU build-id note.
pub fn elf_bytes(with_debug_info: bool, build_id: Option<&[u8]>) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text).set_data(vec![0xC3u8], 1);

    if with_debug_info {
        let debug = obj.add_section(Vec::new(), b".debug_info".to_vec(), SectionKind::Debug);
        obj.section_mut(debug).set_data(vec![0u8; 16], 1);
    }
    if let Some(id) = build_id {
        let note = obj.add_section(Vec::new(), b".note.gnu.build-id".to_vec(), SectionKind::Note);
        obj.section_mut(note).set_data(gnu_build_id_note(id), 4);
    }
    obj.write().expect("write ELF fixture")
}

/// `NT_GNU_BUILD_ID` note: namesz, descsz, type, "GNU\0", padded descriptor.
pub fn gnu_build_id_note(id: &[u8]) -> Vec<u8> {
    let mut note = Vec::new();
    note.extend_from_slice(&4u32.to_le_bytes());
    note.extend_from_slice(&(id.len() as u32).to_le_bytes());
    note.extend_from_slice(&3u32.to_le_bytes());
    note.extend_from_slice(b"GNU\0");
    note.extend_from_slice(id);
    while note.len() % 4 != 0 {
        note.push(0);
    }
    note
}

pub fn write_file(path: &Path, bytes: &[u8], mode: u32) {
    fs::write(path, bytes).expect("write fixture file");
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod fixture file");
}

pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).expect("stat").permissions().mode() & 0o7777
}

/// Scratch tree with separate binary, safe-store, tool, log, and debug directories.
pub struct Sandbox {
    pub root: TempDir,
    pub bin_dir: PathBuf,
    pub safe_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub log_dir: PathBuf,
    pub debug_dir: PathBuf,
}

impl Sandbox {
    /// Sandbox whose tool directory holds the artifact in a nested subdirectory.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let base = root.path().to_path_buf();
        let sandbox = Self {
            bin_dir: base.join("bin"),
            safe_dir: base.join("safe"),
            tools_dir: base.join("tools"),
            log_dir: base.join("logs"),
            debug_dir: base.join("debug"),
            root,
        };
        for dir in [&sandbox.bin_dir, &sandbox.tools_dir, &sandbox.debug_dir] {
            fs::create_dir_all(dir).expect("create sandbox dir");
        }
        let nested = sandbox.tools_dir.join("intel64").join("lib");
        fs::create_dir_all(&nested).expect("create tool dir");
        fs::write(nested.join(TOOL_NAME), b"tool").expect("write tool");
        sandbox
    }

    pub fn config(&self) -> InstrumentConfig {
        InstrumentConfig {
            pin_root: self.root.path().join("pin"),
            tool_search_dir: self.tools_dir.clone(),
            tool_name: TOOL_NAME.to_string(),
            log_dir: self.log_dir.clone(),
            safe_bin_dir: self.safe_dir.clone(),
            debug_root: self.debug_dir.clone(),
            jobs: None,
        }
    }

    /// Write an ELF binary with embedded debug info into `bin/`.
    pub fn binary(&self, name: &str) -> PathBuf {
        let path = self.bin_dir.join(name);
        write_file(&path, &elf_bytes(true, None), 0o750);
        path
    }
}
