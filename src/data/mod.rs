//! Core data model: column types, typed nullable arrays, cell values

pub mod column;

pub use column::{ColumnData, DataType, Value};
