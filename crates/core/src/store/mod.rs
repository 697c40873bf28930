//! Configuration and on-disk layout of the safe store and debug root.
//!
//! - `InstrumentConfig`: serializable settings (directories, tool name, jobs).
//! - `StoreLayout`: computed paths for backups and external debug files.
//! - `load_config`: read a JSON or YAML config file.

pub mod config;
pub mod layout;

pub use config::*;
pub use layout::*;
