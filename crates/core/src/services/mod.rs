//! Services implementing the instrumentation lifecycle and coverage analysis.

pub mod classify;
pub mod coverage;
pub mod debuginfo;
pub mod demangle;
pub mod launcher;
pub mod report;
pub mod summary;
pub mod wrap;
