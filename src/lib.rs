//! Framebase core table engine
//!
//! A columnar table store with two interchangeable backends: an Arrow
//! `RecordBatch` held behind a one-shot native handle, and pure in-process
//! typed arrays. Every operation dispatches to an Arrow kernel when a live
//! handle exists and degrades to the in-process implementation otherwise,
//! with identical results on either path.

pub mod compute;
pub mod data;
pub mod io;
pub mod model;
pub mod native;
pub mod table;

// Re-export main types
pub use compute::GroupedTable;
pub use data::{ColumnData, DataType, Value};
pub use io::{read_csv, write_csv, CsvOptions};
pub use model::{fit_linear, LinearModel};
pub use native::{Backend, NativeHandle};
pub use table::{ColumnView, Field, NumericView, Schema, Table};

/// Table engine error type
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Row index {index} out of bounds for table with {nrows} rows")]
    IndexOutOfBounds { index: usize, nrows: usize },

    #[error("Column '{0}' contains missing values")]
    MissingValue(String),

    #[error("Malformed CSV: {0}")]
    Csv(String),

    #[error("CSV row {row} has {actual} fields, header has {expected}")]
    CsvShape {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Native handle already released")]
    HandleFreed,

    #[error("Native kernel error: {0}")]
    Native(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
