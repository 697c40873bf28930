//! funcov CLI library.
//!
//! Command implementations live here so integration tests can call them
//! directly; `main.rs` only parses arguments and dispatches.

pub mod commands;

pub use commands::*;
