mod common;

use std::fs;
use std::path::PathBuf;

use common::{elf_bytes, write_file};
use funcov_core::model::WrapState;
use funcov_core::services::classify::{classify_path, is_supported_binary};
use funcov_core::services::debuginfo::{
    build_id, has_debug_info, resolve_debug_info, DebugInfoError, DebugInfoStatus,
};
use funcov_core::services::launcher::LAUNCHER_MARKER;
use tempfile::tempdir;

const BUILD_ID: [u8; 8] = [0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89];

#[test]
fn is_supported_binary_accepts_only_elf_magic() {
    let dir = tempdir().expect("tempdir");
    let elf = dir.path().join("prog");
    let text = dir.path().join("script.sh");
    let empty = dir.path().join("empty");
    let short = dir.path().join("short");
    write_file(&elf, &elf_bytes(false, None), 0o755);
    write_file(&text, b"#!/bin/sh\necho hi\n", 0o755);
    write_file(&empty, b"", 0o644);
    write_file(&short, b"\x7fEL", 0o644);

    assert!(is_supported_binary(&elf));
    assert!(!is_supported_binary(&text));
    assert!(!is_supported_binary(&empty));
    assert!(!is_supported_binary(&short));
    assert!(!is_supported_binary(&dir.path().join("missing")));
}

#[test]
fn classify_path_reports_state_from_disk() {
    let dir = tempdir().expect("tempdir");
    let elf = dir.path().join("prog");
    let launcher = dir.path().join("wrapped");
    let other = dir.path().join("notes.txt");
    write_file(&elf, &elf_bytes(false, None), 0o755);
    write_file(&launcher, format!("#!/bin/sh\n# {LAUNCHER_MARKER}\n").as_bytes(), 0o755);
    write_file(&other, b"plain text", 0o644);

    assert_eq!(classify_path(&elf), WrapState::Unwrapped);
    assert_eq!(classify_path(&launcher), WrapState::Wrapped);
    assert_eq!(classify_path(&other), WrapState::Unknown);
    assert_eq!(classify_path(&dir.path().join("missing")), WrapState::Unknown);
}

#[test]
fn marker_outside_scan_window_is_not_a_launcher() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("long.sh");
    let mut content = b"#!/bin/sh\n".to_vec();
    content.extend(std::iter::repeat(b'#').take(16 * 1024));
    content.extend_from_slice(LAUNCHER_MARKER.as_bytes());
    write_file(&path, &content, 0o755);
    assert_eq!(classify_path(&path), WrapState::Unknown);
}

#[test]
fn embedded_debug_info_wins() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("prog");
    write_file(&path, &elf_bytes(true, Some(&BUILD_ID)), 0o755);

    let status = resolve_debug_info(&path, dir.path()).expect("resolve");
    assert_eq!(status, DebugInfoStatus::Embedded);
    assert!(has_debug_info(&path, dir.path()).expect("has debug info"));
}

#[test]
fn stripped_binary_with_external_debug_file_is_found_by_build_id() {
    let dir = tempdir().expect("tempdir");
    let debug_root = dir.path().join("debug");
    let path = dir.path().join("prog");
    write_file(&path, &elf_bytes(false, Some(&BUILD_ID)), 0o755);

    let shard = debug_root.join(".build-id").join("ab");
    fs::create_dir_all(&shard).expect("create shard");
    let external = shard.join("cdef0123456789.debug");
    fs::write(&external, b"debug").expect("write external debug file");

    let status = resolve_debug_info(&path, &debug_root).expect("resolve");
    assert_eq!(status, DebugInfoStatus::External(external));
    assert!(has_debug_info(&path, &debug_root).expect("has debug info"));
}

#[test]
fn stripped_binary_without_external_file_has_no_debug_info() {
    let dir = tempdir().expect("tempdir");
    let with_id = dir.path().join("with_id");
    let without_id = dir.path().join("without_id");
    write_file(&with_id, &elf_bytes(false, Some(&BUILD_ID)), 0o755);
    write_file(&without_id, &elf_bytes(false, None), 0o755);

    assert_eq!(resolve_debug_info(&with_id, dir.path()).expect("resolve"), DebugInfoStatus::Missing);
    assert!(!has_debug_info(&without_id, dir.path()).expect("has debug info"));
}

#[test]
fn build_id_is_extracted_from_note_section() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("prog");
    write_file(&path, &elf_bytes(false, Some(&BUILD_ID)), 0o755);

    let id = build_id(&path).expect("parse").expect("build-id present");
    assert_eq!(id.to_hex(), "abcdef0123456789");
}

#[test]
fn non_elf_and_missing_files_are_distinct_errors() {
    let dir = tempdir().expect("tempdir");
    let text = dir.path().join("notes.txt");
    write_file(&text, b"not an elf file at all", 0o644);

    assert!(matches!(
        resolve_debug_info(&text, dir.path()),
        Err(DebugInfoError::Parse { .. })
    ));
    let missing: PathBuf = dir.path().join("missing");
    assert!(matches!(resolve_debug_info(&missing, dir.path()), Err(DebugInfoError::Io { .. })));
}
