//! Conversions between in-process columns and Arrow arrays
//!
//! The engine round-trips through exactly five boundary types (int64,
//! float64, boolean, utf8, null); anything else coming back from a kernel
//! is a type error, never a panic.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
};
use arrow::datatypes::{
    DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::data::{ColumnData, DataType};
use crate::table::Schema;
use crate::{FrameError, Result};

pub fn datatype_to_arrow(dtype: DataType) -> ArrowDataType {
    match dtype {
        DataType::Int64 => ArrowDataType::Int64,
        DataType::Float64 => ArrowDataType::Float64,
        DataType::Boolean => ArrowDataType::Boolean,
        DataType::Utf8 => ArrowDataType::Utf8,
        DataType::Null => ArrowDataType::Null,
    }
}

pub fn arrow_to_datatype(dtype: &ArrowDataType) -> Result<DataType> {
    match dtype {
        ArrowDataType::Int64 => Ok(DataType::Int64),
        ArrowDataType::Float64 => Ok(DataType::Float64),
        ArrowDataType::Boolean => Ok(DataType::Boolean),
        ArrowDataType::Utf8 => Ok(DataType::Utf8),
        ArrowDataType::Null => Ok(DataType::Null),
        other => Err(FrameError::TypeMismatch(format!(
            "unsupported arrow type {other:?} at the engine boundary"
        ))),
    }
}

/// Build an Arrow array from an in-process column (copies)
pub fn column_to_array(column: &ColumnData) -> ArrayRef {
    match column {
        ColumnData::Int64(v) => Arc::new(Int64Array::from(v.clone())),
        ColumnData::Float64(v) => Arc::new(Float64Array::from(v.clone())),
        ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v.clone())),
        ColumnData::Utf8(v) => Arc::new(
            v.iter()
                .map(|cell| cell.as_deref())
                .collect::<StringArray>(),
        ),
        ColumnData::Null(n) => Arc::new(NullArray::new(*n)),
    }
}

/// Materialize an Arrow array into an in-process column (copies)
pub fn array_to_column(array: &ArrayRef) -> Result<ColumnData> {
    match array.data_type() {
        ArrowDataType::Int64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| FrameError::Native("int64 downcast failed".to_string()))?;
            Ok(ColumnData::Int64(arr.iter().collect()))
        }
        ArrowDataType::Float64 => {
            let arr = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| FrameError::Native("float64 downcast failed".to_string()))?;
            Ok(ColumnData::Float64(arr.iter().collect()))
        }
        ArrowDataType::Boolean => {
            let arr = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| FrameError::Native("boolean downcast failed".to_string()))?;
            Ok(ColumnData::Boolean(arr.iter().collect()))
        }
        ArrowDataType::Utf8 => {
            let arr = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| FrameError::Native("utf8 downcast failed".to_string()))?;
            Ok(ColumnData::Utf8(
                arr.iter().map(|cell| cell.map(str::to_string)).collect(),
            ))
        }
        ArrowDataType::Null => Ok(ColumnData::Null(array.len())),
        other => Err(FrameError::TypeMismatch(format!(
            "unsupported arrow type {other:?} at the engine boundary"
        ))),
    }
}

/// Build a RecordBatch from schema + columns. Handles the zero-column
/// case by carrying the row count through batch options.
pub fn batch_from_columns(
    schema: &Schema,
    columns: &[ColumnData],
    nrows: usize,
) -> Result<RecordBatch> {
    let arrow_fields: Vec<ArrowField> = schema
        .fields()
        .iter()
        .map(|f| ArrowField::new(f.name.clone(), datatype_to_arrow(f.data_type), true))
        .collect();
    let arrays: Vec<ArrayRef> = columns.iter().map(column_to_array).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(nrows));
    RecordBatch::try_new_with_options(Arc::new(ArrowSchema::new(arrow_fields)), arrays, &options)
        .map_err(FrameError::Arrow)
}

/// Materialize a RecordBatch into schema + in-process columns
pub fn columns_from_batch(batch: &RecordBatch) -> Result<(Schema, Vec<ColumnData>)> {
    let mut schema = Schema::new();
    let mut columns = Vec::with_capacity(batch.num_columns());
    for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
        schema.push(field.name().clone(), arrow_to_datatype(field.data_type())?);
        columns.push(array_to_column(array)?);
    }
    Ok((schema, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_array_round_trip() {
        let cols = vec![
            ColumnData::Int64(vec![Some(1), None, Some(-5)]),
            ColumnData::Float64(vec![Some(1.5), None, Some(2.5)]),
            ColumnData::Boolean(vec![Some(true), None, Some(false)]),
            ColumnData::Utf8(vec![Some("a".to_string()), None, Some("b".to_string())]),
            ColumnData::Null(3),
        ];
        for col in cols {
            let array = column_to_array(&col);
            assert_eq!(array.len(), 3);
            let back = array_to_column(&array).unwrap();
            assert_eq!(back, col);
        }
    }

    #[test]
    fn test_zero_column_batch_keeps_row_count() {
        let schema = Schema::new();
        let batch = batch_from_columns(&schema, &[], 7).unwrap();
        assert_eq!(batch.num_rows(), 7);
        assert_eq!(batch.num_columns(), 0);
    }
}
