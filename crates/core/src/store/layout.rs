use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::model::BinaryIdentity;

/// Number of hex characters of the path digest used as a safe-store key.
const STORE_KEY_LEN: usize = 16;

/// Logical layout of the safe store.
///
/// This is derived from the configured roots. It does *not* perform any IO;
/// the wrap engine creates directories as it needs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Directory holding original binaries while they are wrapped.
    pub safe_bin_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(safe_bin_dir: impl AsRef<Path>) -> Self {
        Self { safe_bin_dir: safe_bin_dir.as_ref().to_path_buf() }
    }

    /// Per-binary directory inside the safe store.
    ///
    /// Keyed by the real path so two binaries sharing a base name never land
    /// on the same entry.
    pub fn backup_dir(&self, real_path: &Path) -> PathBuf {
        self.safe_bin_dir.join(store_key(real_path))
    }

    /// Backup location for `real_path` when invoked as `logical_name`.
    ///
    /// The file keeps the logical name so a multicall binary still sees the
    /// name it was invoked under in `argv[0]`.
    pub fn backup_path(&self, real_path: &Path, logical_name: &str) -> PathBuf {
        self.backup_dir(real_path).join(logical_name)
    }
}

/// External debug file for a build-id: `<debug_root>/.build-id/<2 hex>/<rest>.debug`.
///
/// Returns `None` when the build-id is too short to split.
pub fn external_debug_path(debug_root: &Path, identity: &BinaryIdentity) -> Option<PathBuf> {
    let hex = identity.to_hex();
    if hex.len() <= 2 {
        return None;
    }
    let (shard, stem) = hex.split_at(2);
    Some(debug_root.join(".build-id").join(shard).join(format!("{stem}.debug")))
}

/// Stable safe-store key for a real path: truncated SHA-256 of its text form.
pub fn store_key(real_path: &Path) -> String {
    let digest = Sha256::digest(real_path.to_string_lossy().as_bytes());
    let hex = format!("{:x}", digest);
    hex[..STORE_KEY_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_debug_path_uses_two_char_shard() {
        let id = BinaryIdentity::new(vec![0xab, 0xcd, 0xef, 0x01]);
        let path = external_debug_path(Path::new("/usr/lib/debug"), &id).unwrap();
        assert_eq!(path, PathBuf::from("/usr/lib/debug/.build-id/ab/cdef01.debug"));
    }

    #[test]
    fn external_debug_path_rejects_single_byte_ids() {
        let id = BinaryIdentity::new(vec![0xab]);
        assert!(external_debug_path(Path::new("/dbg"), &id).is_none());
    }

    #[test]
    fn backup_path_keeps_logical_name_and_separates_real_paths() {
        let layout = StoreLayout::new("/safe");
        let a = layout.backup_path(Path::new("/usr/bin/tool"), "run0");
        let b = layout.backup_path(Path::new("/opt/bin/tool"), "run0");
        assert_eq!(a.file_name().unwrap(), "run0");
        assert!(a.starts_with("/safe"));
        assert_ne!(a, b);
        assert_eq!(store_key(Path::new("/usr/bin/tool")).len(), STORE_KEY_LEN);
    }
}
