//! Native (Arrow) backend: handle lifecycle, conversions, compute kernels

pub mod convert;
pub mod handle;
pub mod kernels;

pub use handle::NativeHandle;

/// Which backend a newly constructed table should use.
///
/// Threaded explicitly through construction so callers (and tests) can
/// force either execution path; there is no hidden global capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Hold the table behind an Arrow `RecordBatch` native handle
    #[default]
    Native,
    /// Keep the table as pure in-process typed arrays
    InProcess,
}
