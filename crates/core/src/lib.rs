//! funcov-core
//!
//! Core library for function-level coverage of native ELF binaries.
//!
//! This crate owns the whole instrumentation lifecycle: classifying binaries,
//! resolving their debug metadata, swapping them for a launcher that runs them
//! under the instrumentation host (and swapping them back), and turning the
//! resulting engine logs into per-image coverage summaries.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends; the CLI crate only parses arguments and prints.

pub mod model;
pub mod services;
pub mod store;

/// Returns the library version as encoded at compile time.
///
/// Written into every launcher so a wrapped binary records which release
/// produced it.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
