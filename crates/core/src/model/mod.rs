//! Core data model shared by the wrap engine and the coverage aggregator.
//!
//! - `BinaryIdentity`: build-id fingerprint used to find external debug info.
//! - `WrapState`: what a target path currently holds, derived from disk.
//! - `CoverageData`: declared and called function sets for one image.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Build-id fingerprint extracted from a binary's `NT_GNU_BUILD_ID` note.
///
/// Always recomputed from file contents; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinaryIdentity {
    bytes: Vec<u8>,
}

impl BinaryIdentity {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Lowercase hex rendering, as used by `.build-id` debug stores.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for BinaryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Wrap state of a target path, computed fresh from its current content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapState {
    /// The path holds a supported binary.
    Unwrapped,
    /// The path holds one of our launchers.
    Wrapped,
    /// Missing, unreadable, or neither of the above.
    Unknown,
}

impl WrapState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapState::Unwrapped => "unwrapped",
            WrapState::Wrapped => "wrapped",
            WrapState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Function sets observed for a single image.
///
/// `called_functions` is expected to be a subset of `total_functions`, but a
/// call event without a prior declaration is still recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageData {
    pub total_functions: BTreeSet<String>,
    pub called_functions: BTreeSet<String>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_declared(&mut self, function: impl Into<String>) {
        self.total_functions.insert(function.into());
    }

    pub fn record_called(&mut self, function: impl Into<String>) {
        self.called_functions.insert(function.into());
    }

    /// Declared functions that were never observed executing, in name order.
    pub fn uncalled(&self) -> impl Iterator<Item = &str> {
        self.total_functions
            .iter()
            .filter(|f| !self.called_functions.contains(*f))
            .map(String::as_str)
    }
}
