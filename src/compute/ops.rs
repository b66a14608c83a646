//! Structural and scalar operations on tables

use crate::data::ColumnData;
use crate::native::kernels::{self, ScalarOp};
use crate::table::{Schema, Table};
use crate::{FrameError, Result};

impl Table {
    /// Reorder/subset columns by name. Errors on any unknown name;
    /// idempotent for a fixed name list.
    pub fn project(&self, names: &[&str]) -> Result<Table> {
        let indices = self.resolve_names(names)?;
        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                match kernels::project(&batch, &indices) {
                    Ok(out) => Table::from_batch(out),
                    Err(err) => {
                        log::warn!("native project failed, using fallback: {err}");
                        self.materialize()?.project_fallback(&indices)
                    }
                }
            }
            None => self.project_fallback(&indices),
        }
    }

    /// Keep rows where `mask` is true; relative order preserved.
    /// Output row count equals the number of `true` entries.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Table> {
        if mask.len() != self.nrows() {
            return Err(FrameError::LengthMismatch {
                expected: self.nrows(),
                actual: mask.len(),
            });
        }
        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                match kernels::filter_mask(&batch, mask) {
                    Ok(out) => Table::from_batch(out),
                    Err(err) => {
                        log::warn!("native filter failed, using fallback: {err}");
                        self.materialize()?.filter_fallback(mask)
                    }
                }
            }
            None => self.filter_fallback(mask),
        }
    }

    /// Gather rows by index; indices may repeat and must lie in
    /// `[0, nrows)`.
    pub fn take_rows(&self, indices: &[usize]) -> Result<Table> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.nrows()) {
            return Err(FrameError::IndexOutOfBounds {
                index: bad,
                nrows: self.nrows(),
            });
        }
        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                match kernels::take_indices(&batch, indices) {
                    Ok(out) => Table::from_batch(out),
                    Err(err) => {
                        log::warn!("native take failed, using fallback: {err}");
                        self.materialize()?.take_fallback(indices)
                    }
                }
            }
            None => self.take_fallback(indices),
        }
    }

    /// Reorder rows by an externally computed sort order
    pub fn sort_by_indices(&self, indices: &[usize]) -> Result<Table> {
        self.take_rows(indices)
    }

    /// Sort rows by one column. Native-only: `Ok(None)` without a live
    /// handle (callers can always compute an order and use
    /// [`Self::sort_by_indices`]).
    pub fn sort_by_column(&self, name: &str, ascending: bool) -> Result<Option<Table>> {
        let index = self
            .schema()
            .index_of(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))?;
        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                let sorted = kernels::sort_by_column(&batch, index, ascending)?;
                Ok(Some(Table::from_batch(sorted)?))
            }
            None => Ok(None),
        }
    }

    pub fn add_scalar(&self, name: &str, value: f64) -> Result<Option<Table>> {
        self.scalar_op(name, ScalarOp::Add, value)
    }

    pub fn subtract_scalar(&self, name: &str, value: f64) -> Result<Option<Table>> {
        self.scalar_op(name, ScalarOp::Subtract, value)
    }

    pub fn multiply_scalar(&self, name: &str, value: f64) -> Result<Option<Table>> {
        self.scalar_op(name, ScalarOp::Multiply, value)
    }

    pub fn divide_scalar(&self, name: &str, value: f64) -> Result<Option<Table>> {
        self.scalar_op(name, ScalarOp::Divide, value)
    }

    /// Elementwise scalar arithmetic on a numeric column. Native-only;
    /// the result column is widened to Float64.
    fn scalar_op(&self, name: &str, op: ScalarOp, value: f64) -> Result<Option<Table>> {
        let index = self
            .schema()
            .index_of(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))?;
        if !self.schema().field(index).data_type.is_numeric() {
            return Err(FrameError::TypeMismatch(format!(
                "scalar arithmetic requires a numeric column, '{}' is {}",
                name,
                self.schema().field(index).data_type.name()
            )));
        }
        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                let out = kernels::scalar_arith(&batch, index, op, value)?;
                Ok(Some(Table::from_batch(out)?))
            }
            None => Ok(None),
        }
    }

    /// Append or replace a column.
    ///
    /// Always materializes: the native library has no in-place column
    /// mutation, so this permanently drops the native handle. Documented
    /// performance cliff.
    pub fn add_column(&self, name: &str, column: ColumnData) -> Result<Table> {
        let expected = if self.ncols() == 0 && self.nrows() == 0 {
            column.len()
        } else {
            self.nrows()
        };
        if column.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: column.len(),
            });
        }
        let plain = self.materialize()?;
        let mut columns: Vec<(String, ColumnData)> = plain
            .schema()
            .fields()
            .iter()
            .zip(plain.columns())
            .map(|(f, c)| (f.name.clone(), c.clone()))
            .collect();
        match plain.schema().index_of(name) {
            Some(i) => columns[i] = (name.to_string(), column),
            None => columns.push((name.to_string(), column)),
        }
        Table::from_columns(columns)
    }

    fn resolve_names(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|&name| {
                self.schema()
                    .index_of(name)
                    .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
            })
            .collect()
    }

    // Pure in-process implementations. These run either on a fallback
    // table directly or on a materialized copy after a kernel failure.

    fn project_fallback(&self, indices: &[usize]) -> Result<Table> {
        let mut schema = Schema::new();
        let mut columns = Vec::with_capacity(indices.len());
        for &i in indices {
            let field = self.schema().field(i);
            schema.push(field.name.clone(), field.data_type);
            columns.push(self.columns()[i].clone());
        }
        Ok(Table::from_parts(schema, columns, self.nrows()))
    }

    fn filter_fallback(&self, mask: &[bool]) -> Result<Table> {
        let kept = mask.iter().filter(|&&m| m).count();
        let columns = self.columns().iter().map(|c| c.filter(mask)).collect();
        Ok(Table::from_parts(self.schema().clone(), columns, kept))
    }

    fn take_fallback(&self, indices: &[usize]) -> Result<Table> {
        let columns = self.columns().iter().map(|c| c.gather(indices)).collect();
        Ok(Table::from_parts(
            self.schema().clone(),
            columns,
            indices.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataType, Value};
    use crate::native::Backend;

    fn sample(backend: Backend) -> Table {
        Table::from_columns_with(
            vec![
                (
                    "a".to_string(),
                    ColumnData::Int64(vec![Some(3), Some(1), None, Some(2)]),
                ),
                (
                    "b".to_string(),
                    ColumnData::Float64(vec![Some(0.5), Some(1.5), Some(2.5), Some(3.5)]),
                ),
                (
                    "tag".to_string(),
                    ColumnData::Utf8(vec![
                        Some("x".to_string()),
                        Some("y".to_string()),
                        Some("z".to_string()),
                        None,
                    ]),
                ),
            ],
            backend,
        )
        .unwrap()
    }

    #[test]
    fn test_project_both_paths_agree() {
        for backend in [Backend::Native, Backend::InProcess] {
            let table = sample(backend);
            let projected = table.project(&["b", "a"]).unwrap();
            assert_eq!(projected.schema().names(), vec!["b", "a"]);
            assert_eq!(projected.nrows(), 4);
            assert_eq!(
                projected.column_data("a").unwrap(),
                table.column_data("a").unwrap()
            );
            // Idempotence
            let again = projected.project(&["b", "a"]).unwrap();
            assert_eq!(
                again.column_data("b").unwrap(),
                projected.column_data("b").unwrap()
            );
        }
    }

    #[test]
    fn test_project_unknown_column() {
        let table = sample(Backend::InProcess);
        assert!(matches!(
            table.project(&["a", "nope"]),
            Err(FrameError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_filter_invariant_both_paths() {
        let mask = [true, false, true, false];
        for backend in [Backend::Native, Backend::InProcess] {
            let table = sample(backend);
            let filtered = table.filter_rows(&mask).unwrap();
            assert_eq!(filtered.nrows(), 2);
            assert_eq!(
                filtered.column_data("b").unwrap(),
                ColumnData::Float64(vec![Some(0.5), Some(2.5)])
            );
            // Null cells survive the filter
            assert_eq!(filtered.column_data("a").unwrap().value(1), Value::Null);
        }
    }

    #[test]
    fn test_filter_rejects_bad_mask_length() {
        let table = sample(Backend::InProcess);
        assert!(matches!(
            table.filter_rows(&[true, false]),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_take_rows_bounds_checked() {
        let table = sample(Backend::InProcess);
        assert!(matches!(
            table.take_rows(&[0, 4]),
            Err(FrameError::IndexOutOfBounds { index: 4, nrows: 4 })
        ));
        let taken = table.take_rows(&[3, 3, 0]).unwrap();
        assert_eq!(taken.nrows(), 3);
        assert_eq!(
            taken.column_data("b").unwrap(),
            ColumnData::Float64(vec![Some(3.5), Some(3.5), Some(0.5)])
        );
    }

    #[test]
    fn test_sort_by_column_native_only() {
        let fallback = sample(Backend::InProcess);
        assert!(fallback.sort_by_column("a", true).unwrap().is_none());

        let native = sample(Backend::Native);
        let sorted = native.sort_by_column("a", true).unwrap().unwrap();
        assert_eq!(
            sorted.column_data("a").unwrap(),
            ColumnData::Int64(vec![Some(1), Some(2), Some(3), None])
        );
        // Row payloads move with the key
        assert_eq!(
            sorted.column_data("b").unwrap(),
            ColumnData::Float64(vec![Some(1.5), Some(3.5), Some(0.5), Some(2.5)])
        );
    }

    #[test]
    fn test_scalar_ops_native_only_and_widen() {
        let fallback = sample(Backend::InProcess);
        assert!(fallback.add_scalar("a", 1.0).unwrap().is_none());
        assert!(matches!(
            fallback.add_scalar("tag", 1.0),
            Err(FrameError::TypeMismatch(_))
        ));

        let native = sample(Backend::Native);
        let bumped = native.multiply_scalar("a", 10.0).unwrap().unwrap();
        assert_eq!(
            bumped.column_data("a").unwrap(),
            ColumnData::Float64(vec![Some(30.0), Some(10.0), None, Some(20.0)])
        );
        let divided = native.divide_scalar("b", 0.5).unwrap().unwrap();
        assert_eq!(
            divided.column_data("b").unwrap(),
            ColumnData::Float64(vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)])
        );
    }

    #[test]
    fn test_add_column_drops_native_handle() {
        let native = sample(Backend::Native);
        let extended = native
            .add_column(
                "c",
                ColumnData::Boolean(vec![Some(true), None, Some(false), Some(true)]),
            )
            .unwrap();
        assert!(!extended.is_native());
        assert_eq!(extended.ncols(), 4);
        assert_eq!(extended.schema().names(), vec!["a", "b", "tag", "c"]);

        // Replacement keeps position
        let replaced = extended
            .add_column("b", ColumnData::Int64(vec![Some(9), Some(9), Some(9), Some(9)]))
            .unwrap();
        assert_eq!(replaced.schema().names(), vec!["a", "b", "tag", "c"]);
        assert_eq!(replaced.schema().field(1).data_type, DataType::Int64);
    }

    #[test]
    fn test_ops_on_released_handle_are_caught() {
        let native = sample(Backend::Native);
        native.release_native();
        assert!(matches!(
            native.project(&["a"]),
            Err(FrameError::HandleFreed)
        ));
        assert!(matches!(
            native.sort_by_column("a", true),
            Err(FrameError::HandleFreed)
        ));
    }
}
