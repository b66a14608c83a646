//! Arrow compute kernels for the native execution path
//!
//! Every function here is a thin, fallible wrapper over `arrow::compute`
//! operating on a borrowed `RecordBatch`. Failures are returned to the
//! dispatcher, which decides whether a fallback exists.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Scalar, UInt32Array, UInt64Array};
use arrow::compute::{self, SortOptions};
use arrow::datatypes::{DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::Result;

/// Scalar arithmetic selector for the native-only elementwise family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

/// Reorder/subset columns by schema index. Implemented by hand rather
/// than `RecordBatch::project` so a zero-column projection keeps its
/// row count.
pub fn project(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<ArrowField> = indices
        .iter()
        .map(|&i| schema.field(i).clone())
        .collect();
    let columns: Vec<ArrayRef> = indices.iter().map(|&i| batch.column(i).clone()).collect();
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(Arc::new(ArrowSchema::new(fields)), columns, &options)
        .map_err(Into::into)
}

/// Keep rows where `mask` is true
pub fn filter_mask(batch: &RecordBatch, mask: &[bool]) -> Result<RecordBatch> {
    let predicate = BooleanArray::from(mask.to_vec());
    compute::filter_record_batch(batch, &predicate).map_err(Into::into)
}

/// Gather rows by index (permutation or repetition)
pub fn take_indices(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch> {
    let index_array = UInt64Array::from(indices.iter().map(|&i| i as u64).collect::<Vec<_>>());
    let columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| compute::take(col.as_ref(), &index_array, None))
        .collect::<std::result::Result<_, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(indices.len()));
    RecordBatch::try_new_with_options(batch.schema(), columns, &options).map_err(Into::into)
}

/// Sort all rows by one column. Missing cells sort last in either
/// direction.
pub fn sort_by_column(batch: &RecordBatch, column: usize, ascending: bool) -> Result<RecordBatch> {
    let options = SortOptions {
        descending: !ascending,
        nulls_first: false,
    };
    let indices: UInt32Array =
        compute::sort_to_indices(batch.column(column).as_ref(), Some(options), None)?;
    let columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| compute::take(col.as_ref(), &indices, None))
        .collect::<std::result::Result<_, _>>()?;
    RecordBatch::try_new(batch.schema(), columns).map_err(Into::into)
}

/// Elementwise scalar arithmetic on one numeric column.
///
/// The column is cast to Float64 first, so the result column is always
/// Float64 and division follows IEEE semantics (no divide-by-zero error).
pub fn scalar_arith(
    batch: &RecordBatch,
    column: usize,
    op: ScalarOp,
    value: f64,
) -> Result<RecordBatch> {
    use arrow::compute::kernels::numeric;

    let casted = compute::cast(batch.column(column).as_ref(), &ArrowDataType::Float64)?;
    let scalar = Scalar::new(Float64Array::from(vec![value]));
    let result: ArrayRef = match op {
        ScalarOp::Add => numeric::add(&casted, &scalar)?,
        ScalarOp::Subtract => numeric::sub(&casted, &scalar)?,
        ScalarOp::Multiply => numeric::mul(&casted, &scalar)?,
        ScalarOp::Divide => numeric::div(&casted, &scalar)?,
    };

    let schema = batch.schema();
    let fields: Vec<ArrowField> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i == column {
                ArrowField::new(f.name().clone(), ArrowDataType::Float64, true)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();
    let columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| if i == column { result.clone() } else { col.clone() })
        .collect();
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array};

    fn sample_batch() -> RecordBatch {
        let a: ArrayRef = Arc::new(Int64Array::from(vec![Some(3), Some(1), None, Some(2)]));
        let b: ArrayRef = Arc::new(Float64Array::from(vec![
            Some(0.5),
            Some(1.5),
            Some(2.5),
            None,
        ]));
        RecordBatch::try_from_iter(vec![("a", a), ("b", b)]).unwrap()
    }

    #[test]
    fn test_project_keeps_row_count_when_empty() {
        let batch = sample_batch();
        let projected = project(&batch, &[]).unwrap();
        assert_eq!(projected.num_columns(), 0);
        assert_eq!(projected.num_rows(), 4);
    }

    #[test]
    fn test_filter_and_take() {
        let batch = sample_batch();
        let filtered = filter_mask(&batch, &[true, false, true, false]).unwrap();
        assert_eq!(filtered.num_rows(), 2);

        let taken = take_indices(&batch, &[3, 0, 0]).unwrap();
        assert_eq!(taken.num_rows(), 3);
        let a = taken
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(a.value(0), 2);
        assert_eq!(a.value(1), 3);
    }

    #[test]
    fn test_sort_nulls_last() {
        let batch = sample_batch();
        let sorted = sort_by_column(&batch, 0, true).unwrap();
        let a = sorted
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(a.value(0), 1);
        assert_eq!(a.value(1), 2);
        assert_eq!(a.value(2), 3);
        assert!(a.is_null(3));
    }

    #[test]
    fn test_scalar_arith_casts_to_float() {
        let batch = sample_batch();
        let result = scalar_arith(&batch, 0, ScalarOp::Multiply, 2.0).unwrap();
        let a = result
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(a.value(0), 6.0);
        assert!(a.is_null(2));
    }
}
