//! Typed nullable column arrays
//!
//! `ColumnData` is the pure in-process representation of a column: one
//! vector per logical type, with `None` encoding a missing cell. Array
//! length equals the owning table's row count.

use serde::{Deserialize, Serialize};

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    /// An all-missing column whose element type is unknown
    Null,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Boolean => "boolean",
            DataType::Utf8 => "utf8",
            DataType::Null => "null",
        }
    }
}

/// A single cell value at the engine boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    Boolean(bool),
    Utf8(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric widening for Int64/Float64 cells
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Type-specific column storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Utf8(Vec<Option<String>>),
    /// All-missing column of known length
    Null(usize),
}

impl ColumnData {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Null(_) => DataType::Null,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Null(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of missing cells
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Float64(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Boolean(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Utf8(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Null(n) => *n,
        }
    }

    /// Cell at `index`. Out-of-range reads are a caller bug; callers
    /// validate indices before gathering.
    pub fn value(&self, index: usize) -> Value {
        match self {
            ColumnData::Int64(v) => v[index].map(Value::Int64).unwrap_or(Value::Null),
            ColumnData::Float64(v) => v[index].map(Value::Float64).unwrap_or(Value::Null),
            ColumnData::Boolean(v) => v[index].map(Value::Boolean).unwrap_or(Value::Null),
            ColumnData::Utf8(v) => v[index]
                .as_ref()
                .map(|s| Value::Utf8(s.clone()))
                .unwrap_or(Value::Null),
            ColumnData::Null(_) => Value::Null,
        }
    }

    /// Numeric cell widened to f64; `None` for missing or non-numeric
    pub fn as_f64(&self, index: usize) -> Option<f64> {
        match self {
            ColumnData::Int64(v) => v[index].map(|x| x as f64),
            ColumnData::Float64(v) => v[index],
            _ => None,
        }
    }

    /// Gather cells at `indices` into a new column of the same type
    pub fn gather(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Float64(v) => {
                ColumnData::Float64(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnData::Boolean(v) => {
                ColumnData::Boolean(indices.iter().map(|&i| v[i]).collect())
            }
            ColumnData::Utf8(v) => {
                ColumnData::Utf8(indices.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::Null(_) => ColumnData::Null(indices.len()),
        }
    }

    /// Keep cells where `mask` is true, preserving relative order.
    /// `mask.len()` must equal `self.len()`; callers validate.
    pub fn filter(&self, mask: &[bool]) -> ColumnData {
        fn keep<T: Clone>(v: &[Option<T>], mask: &[bool]) -> Vec<Option<T>> {
            v.iter()
                .zip(mask)
                .filter(|(_, &m)| m)
                .map(|(c, _)| c.clone())
                .collect()
        }
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(keep(v, mask)),
            ColumnData::Float64(v) => ColumnData::Float64(keep(v, mask)),
            ColumnData::Boolean(v) => ColumnData::Boolean(keep(v, mask)),
            ColumnData::Utf8(v) => ColumnData::Utf8(keep(v, mask)),
            ColumnData::Null(_) => ColumnData::Null(mask.iter().filter(|&&m| m).count()),
        }
    }
}
