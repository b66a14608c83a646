//! Table implementation
//!
//! A `Table` pairs a schema with one of two backings: a live Arrow
//! `RecordBatch` behind a [`NativeHandle`], or pure in-process
//! [`ColumnData`] arrays. Tables are immutable; every operation returns a
//! new table. When the handle is present and live it is authoritative and
//! `columns` stays empty; otherwise `columns` holds exactly one entry per
//! schema field, each of length `nrows`.

use std::sync::Arc;

use arrow::array::{Array, Float64Array, Int64Array};
use arrow::datatypes::DataType as ArrowDataType;
use arrow::record_batch::RecordBatch;

use crate::data::ColumnData;
use crate::native::{convert, Backend, NativeHandle};
use crate::table::{ColumnView, NumericView, Schema};
use crate::{FrameError, Result};

#[derive(Debug, Clone)]
pub struct Table {
    schema: Schema,
    /// In-process columns; empty while the native handle is authoritative
    columns: Vec<ColumnData>,
    nrows: usize,
    native: Option<Arc<NativeHandle>>,
}

impl Table {
    /// Build a pure in-process table from named columns.
    /// All columns must have equal length.
    pub fn from_columns(columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let nrows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut schema = Schema::new();
        let mut data = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            if column.len() != nrows {
                return Err(FrameError::LengthMismatch {
                    expected: nrows,
                    actual: column.len(),
                });
            }
            schema.push(name, column.data_type());
            data.push(column);
        }
        Ok(Self {
            schema,
            columns: data,
            nrows,
            native: None,
        })
    }

    /// Build a table on the requested backend
    pub fn from_columns_with(
        columns: Vec<(String, ColumnData)>,
        backend: Backend,
    ) -> Result<Self> {
        let table = Self::from_columns(columns)?;
        match backend {
            Backend::Native => table.to_native(),
            Backend::InProcess => Ok(table),
        }
    }

    /// Wrap an Arrow batch in a fresh native handle
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let mut schema = Schema::new();
        for field in batch.schema().fields() {
            schema.push(
                field.name().clone(),
                convert::arrow_to_datatype(field.data_type())?,
            );
        }
        let nrows = batch.num_rows();
        Ok(Self {
            schema,
            columns: Vec::new(),
            nrows,
            native: Some(Arc::new(NativeHandle::new(batch))),
        })
    }

    pub(crate) fn from_parts(schema: Schema, columns: Vec<ColumnData>, nrows: usize) -> Self {
        Self {
            schema,
            columns,
            nrows,
            native: None,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.schema.len()
    }

    /// True when a live (not yet released) native handle backs this table
    pub fn is_native(&self) -> bool {
        self.native.as_ref().is_some_and(|h| !h.is_freed())
    }

    pub(crate) fn native_handle(&self) -> Option<&Arc<NativeHandle>> {
        self.native.as_ref()
    }

    /// Explicitly release the native resource. Idempotent; later use of
    /// this table's native path reports `HandleFreed`.
    pub fn release_native(&self) {
        if let Some(handle) = &self.native {
            handle.release();
        }
    }

    /// Copy into a pure in-process table, dropping the native handle
    pub fn materialize(&self) -> Result<Self> {
        match &self.native {
            Some(handle) => {
                let (schema, columns) = convert::columns_from_batch(&handle.batch()?)?;
                let nrows = self.nrows;
                Ok(Self {
                    schema,
                    columns,
                    nrows,
                    native: None,
                })
            }
            None => Ok(self.clone()),
        }
    }

    /// Re-home this table behind a fresh native handle
    pub fn to_native(&self) -> Result<Self> {
        if self.is_native() {
            return Ok(self.clone());
        }
        let source = if self.native.is_some() {
            // Handle present but freed: reject rather than resurrect.
            return Err(FrameError::HandleFreed);
        } else {
            self
        };
        let batch = convert::batch_from_columns(&source.schema, &source.columns, source.nrows)?;
        Self::from_batch(batch)
    }

    /// In-process columns; only meaningful on the fallback backing
    pub(crate) fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    /// Materialized copy of one column, regardless of backing
    pub fn column_data(&self, name: &str) -> Result<ColumnData> {
        let index = self.column_index(name)?;
        match &self.native {
            Some(handle) => convert::array_to_column(handle.batch()?.column(index)),
            None => Ok(self.columns[index].clone()),
        }
    }

    /// Managed column view: a copy for every column type, pinning the
    /// native handle so the foreign resource outlives the view.
    pub fn get_column(&self, name: &str) -> Result<ColumnView> {
        let data = self.column_data(name)?;
        Ok(ColumnView::new(name.to_string(), data, self.native.clone()))
    }

    /// Zero-copy view over a native Float64 column.
    ///
    /// `Ok(None)` when the table is not native-backed or the column is not
    /// Float64; `HandleFreed` when the handle was already released.
    pub fn float64_view(&self, name: &str) -> Result<Option<NumericView<f64>>> {
        let index = self.column_index(name)?;
        let Some(handle) = &self.native else {
            return Ok(None);
        };
        let batch = handle.batch()?;
        let column = batch.column(index);
        if column.data_type() != &ArrowDataType::Float64 {
            return Ok(None);
        }
        let array = column
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| FrameError::Native("float64 downcast failed".to_string()))?;
        let values: &[f64] = array.values();
        Ok(Some(NumericView::new(
            values.as_ptr(),
            values.len(),
            array.null_count(),
            column.clone(),
            handle.clone(),
        )))
    }

    /// Zero-copy view over a native Int64 column; see [`Self::float64_view`]
    pub fn int64_view(&self, name: &str) -> Result<Option<NumericView<i64>>> {
        let index = self.column_index(name)?;
        let Some(handle) = &self.native else {
            return Ok(None);
        };
        let batch = handle.batch()?;
        let column = batch.column(index);
        if column.data_type() != &ArrowDataType::Int64 {
            return Ok(None);
        }
        let array = column
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| FrameError::Native("int64 downcast failed".to_string()))?;
        let values: &[i64] = array.values();
        Ok(Some(NumericView::new(
            values.as_ptr(),
            values.len(),
            array.null_count(),
            column.clone(),
            handle.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn sample_columns() -> Vec<(String, ColumnData)> {
        vec![
            (
                "id".to_string(),
                ColumnData::Int64(vec![Some(1), Some(2), Some(3)]),
            ),
            (
                "score".to_string(),
                ColumnData::Float64(vec![Some(0.5), None, Some(2.5)]),
            ),
            (
                "name".to_string(),
                ColumnData::Utf8(vec![
                    Some("a".to_string()),
                    Some("b".to_string()),
                    None,
                ]),
            ),
        ]
    }

    #[test]
    fn test_from_columns_validates_lengths() {
        let result = Table::from_columns(vec![
            ("a".to_string(), ColumnData::Int64(vec![Some(1)])),
            ("b".to_string(), ColumnData::Int64(vec![Some(1), Some(2)])),
        ]);
        assert!(matches!(
            result,
            Err(FrameError::LengthMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_native_round_trip_preserves_cells() {
        let table = Table::from_columns(sample_columns()).unwrap();
        let native = table.to_native().unwrap();
        assert!(native.is_native());
        assert_eq!(native.nrows(), 3);

        let back = native.materialize().unwrap();
        assert!(!back.is_native());
        for name in ["id", "score", "name"] {
            assert_eq!(
                back.column_data(name).unwrap(),
                table.column_data(name).unwrap()
            );
        }
        assert_eq!(back.column_data("score").unwrap().value(1), Value::Null);
    }

    #[test]
    fn test_use_after_release_is_caught() {
        let table = Table::from_columns_with(sample_columns(), Backend::Native).unwrap();
        table.release_native();
        assert!(!table.is_native());
        assert!(matches!(
            table.column_data("id"),
            Err(FrameError::HandleFreed)
        ));
        assert!(matches!(
            table.float64_view("score"),
            Err(FrameError::HandleFreed)
        ));
    }

    #[test]
    fn test_zero_copy_view_outlives_table_binding() {
        let table = Table::from_columns_with(
            vec![(
                "x".to_string(),
                ColumnData::Float64(vec![Some(1.0), Some(2.0), Some(3.0)]),
            )],
            Backend::Native,
        )
        .unwrap();
        let view = table.float64_view("x").unwrap().unwrap();
        drop(table);
        // The view pins the handle; the buffer is still reachable.
        assert_eq!(view.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(view.null_count(), 0);
    }

    #[test]
    fn test_views_are_native_only_and_type_checked() {
        let fallback = Table::from_columns(sample_columns()).unwrap();
        assert!(fallback.float64_view("score").unwrap().is_none());

        let native = fallback.to_native().unwrap();
        assert!(native.float64_view("score").unwrap().is_some());
        // Wrong element type: no view rather than a reinterpret.
        assert!(native.float64_view("id").unwrap().is_none());
        assert!(native.int64_view("id").unwrap().is_some());
        assert!(matches!(
            native.float64_view("missing"),
            Err(FrameError::ColumnNotFound(_))
        ));
    }
}
