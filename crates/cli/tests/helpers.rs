//! Fixtures shared by CLI integration tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use tempfile::TempDir;

/// Minimal ELF object with an embedded `.debug_info` section.
pub fn write_elf(path: &Path) {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(text).set_data(vec![0xC3u8], 1);
    let debug = obj.add_section(Vec::new(), b".debug_info".to_vec(), SectionKind::Debug);
    obj.section_mut(debug).set_data(vec![0u8; 8], 1);
    fs::write(path, obj.write().expect("write ELF fixture")).expect("write binary");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod binary");
}

/// Scratch directories wired up through the same environment variables the
/// CLI reads.
pub struct CliSandbox {
    pub root: TempDir,
    pub bin_dir: PathBuf,
    pub safe_dir: PathBuf,
    pub tools_dir: PathBuf,
}

impl CliSandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let bin_dir = root.path().join("bin");
        let safe_dir = root.path().join("safe");
        let tools_dir = root.path().join("tools");
        fs::create_dir_all(&bin_dir).expect("create bin dir");
        fs::create_dir_all(tools_dir.join("lib")).expect("create tools dir");
        fs::write(tools_dir.join("lib").join("FuncTracer.so"), b"tool").expect("write tool");
        Self { root, bin_dir, safe_dir, tools_dir }
    }

    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("funcov");
        cmd.env_remove("FUNCOV_LOG")
            .env("SAFE_BIN_DIR", &self.safe_dir)
            .env("PIN_TOOL_SEARCH_DIR", &self.tools_dir)
            .env("PIN_ROOT", self.root.path().join("pin"))
            .env("LOG_DIR", self.root.path().join("logs"))
            .env("DEBUG_ROOT", self.root.path().join("debug"));
        cmd
    }

    pub fn binary(&self, name: &str) -> PathBuf {
        let path = self.bin_dir.join(name);
        write_elf(&path);
        path
    }
}
