//! Compute operations: per-operation native/fallback dispatch
//!
//! Dispatch rule: with a live native handle, run the Arrow kernel; if the
//! kernel fails, log and re-run the pure in-process implementation.
//! A native failure never reaches the caller when a fallback exists.
//! `sort_by_column` and the scalar-arithmetic family are native-only and
//! yield `Ok(None)` without a handle.

pub mod group;
pub mod ops;

pub use group::GroupedTable;
