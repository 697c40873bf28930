//! Binary classification and wrap-state detection.
//!
//! Both checks are pure predicates over what is on disk right now: I/O errors
//! degrade to a negative answer instead of propagating.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::model::WrapState;
use crate::services::launcher::LAUNCHER_MARKER;

/// ELF identification bytes.
pub const ELF_MAGIC: [u8; 4] = *b"\x7fELF";

/// How much of a file is scanned for the launcher marker.
const MARKER_WINDOW: u64 = 8 * 1024;

/// Does `path` hold a supported executable format?
///
/// Returns false for missing, empty, unreadable, or non-matching files.
pub fn is_supported_binary(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => magic == ELF_MAGIC,
        Err(_) => false,
    }
}

/// Does `path` hold one of our launchers?
///
/// A launcher is a script (`#!`) carrying the marker within its first
/// `MARKER_WINDOW` bytes.
pub fn carries_launcher_marker(path: &Path) -> bool {
    let Ok(file) = File::open(path) else { return false };
    let mut head = Vec::new();
    if file.take(MARKER_WINDOW).read_to_end(&mut head).is_err() {
        return false;
    }
    head.starts_with(b"#!") && contains(&head, LAUNCHER_MARKER.as_bytes())
}

/// Current wrap state of `path`, computed fresh on every call.
pub fn classify_path(path: &Path) -> WrapState {
    if carries_launcher_marker(path) {
        WrapState::Wrapped
    } else if is_supported_binary(path) {
        WrapState::Unwrapped
    } else {
        WrapState::Unknown
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
