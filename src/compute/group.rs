//! Grouped aggregation
//!
//! `group_by` hash-partitions rows by a composite key; the resulting
//! `GroupedTable` evaluates sum/mean/count per partition. On a
//! native-backed table the partition and the aggregates read the batch's
//! Arrow arrays directly (downcast once per column); the fallback runs
//! the same algorithm over the in-process arrays. Group output order is
//! key-encounter order, which the two paths may report differently;
//! callers comparing across paths must canonicalize.

use ahash::AHashMap;
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType as ArrowDataType;
use arrow::record_batch::RecordBatch;

use crate::data::{ColumnData, Value};
use crate::native::convert;
use crate::table::Table;
use crate::{FrameError, Result};

/// Hashable composite-key cell. Floats are keyed by bit pattern, so
/// -0.0 and 0.0 form distinct groups and NaN groups with itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyCell {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(String),
    Missing,
}

impl KeyCell {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Int64(v) => KeyCell::Int(v),
            Value::Float64(v) => KeyCell::Float(v.to_bits()),
            Value::Boolean(v) => KeyCell::Bool(v),
            Value::Utf8(v) => KeyCell::Str(v),
            Value::Null => KeyCell::Missing,
        }
    }
}

/// One key column of a native batch, downcast once
enum KeyArray<'a> {
    Int(&'a Int64Array),
    Float(&'a Float64Array),
    Bool(&'a BooleanArray),
    Str(&'a StringArray),
    AllMissing,
}

impl<'a> KeyArray<'a> {
    fn try_new(array: &'a ArrayRef) -> Result<Self> {
        match array.data_type() {
            ArrowDataType::Int64 => array
                .as_any()
                .downcast_ref::<Int64Array>()
                .map(KeyArray::Int)
                .ok_or_else(|| FrameError::Native("int64 downcast failed".to_string())),
            ArrowDataType::Float64 => array
                .as_any()
                .downcast_ref::<Float64Array>()
                .map(KeyArray::Float)
                .ok_or_else(|| FrameError::Native("float64 downcast failed".to_string())),
            ArrowDataType::Boolean => array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .map(KeyArray::Bool)
                .ok_or_else(|| FrameError::Native("boolean downcast failed".to_string())),
            ArrowDataType::Utf8 => array
                .as_any()
                .downcast_ref::<StringArray>()
                .map(KeyArray::Str)
                .ok_or_else(|| FrameError::Native("utf8 downcast failed".to_string())),
            ArrowDataType::Null => Ok(KeyArray::AllMissing),
            other => Err(FrameError::TypeMismatch(format!(
                "unsupported arrow type {other:?} in a group key"
            ))),
        }
    }

    fn cell(&self, row: usize) -> KeyCell {
        match self {
            KeyArray::Int(a) if a.is_valid(row) => KeyCell::Int(a.value(row)),
            KeyArray::Float(a) if a.is_valid(row) => KeyCell::Float(a.value(row).to_bits()),
            KeyArray::Bool(a) if a.is_valid(row) => KeyCell::Bool(a.value(row)),
            KeyArray::Str(a) if a.is_valid(row) => KeyCell::Str(a.value(row).to_string()),
            _ => KeyCell::Missing,
        }
    }
}

/// Key-encounter-order partition: one row-index set per distinct key.
/// O(n) over rows with O(1) amortized per-row update.
fn partition<F>(nrows: usize, key_of: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Vec<KeyCell>,
{
    let mut index: AHashMap<Vec<KeyCell>, usize> = AHashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..nrows {
        let slot = *index.entry(key_of(row)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    groups
}

/// Result of [`Table::group_by`]: key columns plus per-group row sets
#[derive(Debug)]
pub struct GroupedTable {
    key_names: Vec<String>,
    key_columns: Vec<ColumnData>,
    /// Row indices per group, groups in key-encounter order
    groups: Vec<Vec<usize>>,
    /// Snapshot of the native batch; aggregates read its arrays directly
    batch: Option<RecordBatch>,
    source: Table,
}

impl Table {
    /// Hash-partition rows by the composite key formed from `keys`.
    ///
    /// On a native-backed table the key cells are read straight from the
    /// batch's arrays; the fallback partitions the in-process columns.
    /// Missing cells form their own group per key column.
    pub fn group_by(&self, keys: &[&str]) -> Result<GroupedTable> {
        if keys.is_empty() {
            return Err(FrameError::ColumnNotFound(
                "group_by requires at least one key column".to_string(),
            ));
        }
        let key_indices: Vec<usize> = keys
            .iter()
            .map(|&name| {
                self.schema()
                    .index_of(name)
                    .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
            })
            .collect::<Result<_>>()?;
        let key_names: Vec<String> = keys.iter().map(|&k| k.to_string()).collect();

        match self.native_handle() {
            Some(handle) => {
                let batch = handle.batch()?;
                let key_arrays: Vec<KeyArray> = key_indices
                    .iter()
                    .map(|&i| KeyArray::try_new(batch.column(i)))
                    .collect::<Result<_>>()?;
                let groups = partition(self.nrows(), |row| {
                    key_arrays.iter().map(|a| a.cell(row)).collect()
                });
                // Materialized copies of the key columns for the output
                // tables; the aggregates keep reading the batch itself.
                let key_columns = key_indices
                    .iter()
                    .map(|&i| convert::array_to_column(batch.column(i)))
                    .collect::<Result<_>>()?;
                Ok(GroupedTable {
                    key_names,
                    key_columns,
                    groups,
                    batch: Some(batch),
                    source: self.clone(),
                })
            }
            None => {
                let key_columns: Vec<ColumnData> = key_indices
                    .iter()
                    .map(|&i| self.columns()[i].clone())
                    .collect();
                let groups = partition(self.nrows(), |row| {
                    key_columns
                        .iter()
                        .map(|col| KeyCell::from_value(col.value(row)))
                        .collect()
                });
                Ok(GroupedTable {
                    key_names,
                    key_columns,
                    groups,
                    batch: None,
                    source: self.clone(),
                })
            }
        }
    }
}

impl GroupedTable {
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Per-group sum of a numeric column (missing cells skipped; an
    /// all-missing group sums to a missing cell, as does an Int64 group
    /// whose total leaves the i64 range). Int64 stays Int64.
    pub fn sum(&self, column: &str) -> Result<Table> {
        let index = self.numeric_index(column)?;
        let aggregate = match &self.batch {
            Some(batch) => self.sum_native(batch.column(index))?,
            None => self.sum_fallback(&self.source.columns()[index]),
        };
        self.build_output("sum", aggregate)
    }

    /// Per-group mean of a numeric column (missing cells skipped)
    pub fn mean(&self, column: &str) -> Result<Table> {
        let index = self.numeric_index(column)?;
        let means = match &self.batch {
            Some(batch) => self.mean_native(batch.column(index))?,
            None => self.mean_over(|row| self.source.columns()[index].as_f64(row)),
        };
        self.build_output("mean", ColumnData::Float64(means))
    }

    /// Per-group row count (independent of nulls in any value column)
    pub fn count(&self) -> Result<Table> {
        let counts: Vec<Option<i64>> = self
            .groups
            .iter()
            .map(|rows| Some(rows.len() as i64))
            .collect();
        self.build_output("count", ColumnData::Int64(counts))
    }

    fn sum_native(&self, array: &ArrayRef) -> Result<ColumnData> {
        match array.data_type() {
            ArrowDataType::Int64 => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| FrameError::Native("int64 downcast failed".to_string()))?;
                Ok(self.sum_int(|row| arr.is_valid(row).then(|| arr.value(row))))
            }
            ArrowDataType::Float64 => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| FrameError::Native("float64 downcast failed".to_string()))?;
                Ok(self.sum_float(|row| arr.is_valid(row).then(|| arr.value(row))))
            }
            other => Err(FrameError::TypeMismatch(format!(
                "aggregation requires a numeric column, got arrow type {other:?}"
            ))),
        }
    }

    fn sum_fallback(&self, data: &ColumnData) -> ColumnData {
        match data {
            ColumnData::Int64(values) => self.sum_int(|row| values[row]),
            ColumnData::Float64(values) => self.sum_float(|row| values[row]),
            _ => unreachable!("numeric_index admitted a non-numeric column"),
        }
    }

    /// Int64 sums accumulate in i128; a total outside the i64 range is
    /// reported as missing rather than wrapping.
    fn sum_int<F: Fn(usize) -> Option<i64>>(&self, cell: F) -> ColumnData {
        ColumnData::Int64(
            self.groups
                .iter()
                .map(|rows| {
                    let mut acc: Option<i128> = None;
                    for &row in rows {
                        if let Some(v) = cell(row) {
                            acc = Some(acc.unwrap_or(0) + v as i128);
                        }
                    }
                    acc.and_then(|total| i64::try_from(total).ok())
                })
                .collect(),
        )
    }

    fn sum_float<F: Fn(usize) -> Option<f64>>(&self, cell: F) -> ColumnData {
        ColumnData::Float64(
            self.groups
                .iter()
                .map(|rows| {
                    let mut acc: Option<f64> = None;
                    for &row in rows {
                        if let Some(v) = cell(row) {
                            acc = Some(acc.unwrap_or(0.0) + v);
                        }
                    }
                    acc
                })
                .collect(),
        )
    }

    fn mean_native(&self, array: &ArrayRef) -> Result<Vec<Option<f64>>> {
        match array.data_type() {
            ArrowDataType::Int64 => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| FrameError::Native("int64 downcast failed".to_string()))?;
                Ok(self.mean_over(|row| arr.is_valid(row).then(|| arr.value(row) as f64)))
            }
            ArrowDataType::Float64 => {
                let arr = array
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| FrameError::Native("float64 downcast failed".to_string()))?;
                Ok(self.mean_over(|row| arr.is_valid(row).then(|| arr.value(row))))
            }
            other => Err(FrameError::TypeMismatch(format!(
                "aggregation requires a numeric column, got arrow type {other:?}"
            ))),
        }
    }

    fn mean_over<F: Fn(usize) -> Option<f64>>(&self, cell: F) -> Vec<Option<f64>> {
        self.groups
            .iter()
            .map(|rows| {
                let mut sum = 0.0;
                let mut n = 0usize;
                for &row in rows {
                    if let Some(v) = cell(row) {
                        sum += v;
                        n += 1;
                    }
                }
                if n > 0 {
                    Some(sum / n as f64)
                } else {
                    None
                }
            })
            .collect()
    }

    fn numeric_index(&self, column: &str) -> Result<usize> {
        let index = self
            .source
            .schema()
            .index_of(column)
            .ok_or_else(|| FrameError::ColumnNotFound(column.to_string()))?;
        let dtype = self.source.schema().field(index).data_type;
        if !dtype.is_numeric() {
            return Err(FrameError::TypeMismatch(format!(
                "aggregation requires a numeric column, '{}' is {}",
                column,
                dtype.name()
            )));
        }
        Ok(index)
    }

    fn build_output(&self, aggregate_name: &str, aggregate: ColumnData) -> Result<Table> {
        // First row of each group represents its key tuple.
        let representatives: Vec<usize> = self.groups.iter().map(|rows| rows[0]).collect();
        let mut columns: Vec<(String, ColumnData)> = self
            .key_names
            .iter()
            .zip(&self.key_columns)
            .map(|(name, col)| (name.clone(), col.gather(&representatives)))
            .collect();
        columns.push((aggregate_name.to_string(), aggregate));
        Table::from_columns(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Backend;

    fn dept_table(backend: Backend) -> Table {
        Table::from_columns_with(
            vec![
                (
                    "dept".to_string(),
                    ColumnData::Utf8(vec![
                        Some("eng".to_string()),
                        Some("eng".to_string()),
                        Some("sales".to_string()),
                    ]),
                ),
                (
                    "salary".to_string(),
                    ColumnData::Int64(vec![Some(100), Some(200), Some(50)]),
                ),
            ],
            backend,
        )
        .unwrap()
    }

    /// Canonicalize group output as (key, aggregate) pairs sorted by key
    fn pairs(table: &Table, key: &str, agg: &str) -> Vec<(Value, Value)> {
        let keys = table.column_data(key).unwrap();
        let aggs = table.column_data(agg).unwrap();
        let mut out: Vec<(Value, Value)> = (0..table.nrows())
            .map(|i| (keys.value(i), aggs.value(i)))
            .collect();
        out.sort_by_key(|(k, _)| format!("{k:?}"));
        out
    }

    #[test]
    fn test_group_sum_by_department() {
        for backend in [Backend::Native, Backend::InProcess] {
            let table = dept_table(backend);
            let summed = table.group_by(&["dept"]).unwrap().sum("salary").unwrap();
            assert_eq!(summed.nrows(), 2);
            assert_eq!(
                pairs(&summed, "dept", "sum"),
                vec![
                    (Value::Utf8("eng".to_string()), Value::Int64(300)),
                    (Value::Utf8("sales".to_string()), Value::Int64(50)),
                ]
            );
        }
    }

    #[test]
    fn test_paths_agree_after_canonicalization() {
        let native = dept_table(Backend::Native);
        let fallback = dept_table(Backend::InProcess);
        for (n, f) in [
            (
                native.group_by(&["dept"]).unwrap().mean("salary").unwrap(),
                fallback.group_by(&["dept"]).unwrap().mean("salary").unwrap(),
            ),
            (
                native.group_by(&["dept"]).unwrap().count().unwrap(),
                fallback.group_by(&["dept"]).unwrap().count().unwrap(),
            ),
        ] {
            let agg = n.schema().field(1).name.clone();
            assert_eq!(pairs(&n, "dept", &agg), pairs(&f, "dept", &agg));
        }
    }

    #[test]
    fn test_native_grouping_survives_release() {
        let table = dept_table(Backend::Native);
        let grouped = table.group_by(&["dept"]).unwrap();
        // The batch snapshot keeps the arrays reachable on its own.
        table.release_native();
        let summed = grouped.sum("salary").unwrap();
        assert_eq!(
            pairs(&summed, "dept", "sum"),
            vec![
                (Value::Utf8("eng".to_string()), Value::Int64(300)),
                (Value::Utf8("sales".to_string()), Value::Int64(50)),
            ]
        );
        let counted = grouped.count().unwrap();
        assert_eq!(counted.nrows(), 2);
    }

    #[test]
    fn test_composite_key_and_missing_group() {
        let table = Table::from_columns(vec![
            (
                "a".to_string(),
                ColumnData::Int64(vec![Some(1), Some(1), None, Some(1)]),
            ),
            (
                "b".to_string(),
                ColumnData::Boolean(vec![Some(true), Some(false), Some(true), Some(true)]),
            ),
            (
                "v".to_string(),
                ColumnData::Float64(vec![Some(1.0), Some(2.0), Some(4.0), Some(8.0)]),
            ),
        ])
        .unwrap();
        let grouped = table.group_by(&["a", "b"]).unwrap();
        // (1,true), (1,false), (missing,true)
        assert_eq!(grouped.num_groups(), 3);
        let sums = grouped.sum("v").unwrap();
        assert_eq!(sums.nrows(), 3);
        let totals = sums.column_data("sum").unwrap();
        let mut values: Vec<f64> = (0..3).map(|i| totals.as_f64(i).unwrap()).collect();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![2.0, 4.0, 9.0]);
    }

    #[test]
    fn test_aggregate_type_errors() {
        let table = dept_table(Backend::InProcess);
        let grouped = table.group_by(&["dept"]).unwrap();
        assert!(matches!(
            grouped.sum("dept"),
            Err(FrameError::TypeMismatch(_))
        ));
        assert!(matches!(
            grouped.sum("nope"),
            Err(FrameError::ColumnNotFound(_))
        ));
        assert!(matches!(
            table.group_by(&["nope"]),
            Err(FrameError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_all_missing_group_sums_to_missing() {
        let table = Table::from_columns(vec![
            (
                "k".to_string(),
                ColumnData::Utf8(vec![Some("a".to_string()), Some("a".to_string())]),
            ),
            ("v".to_string(), ColumnData::Int64(vec![None, None])),
        ])
        .unwrap();
        let summed = table.group_by(&["k"]).unwrap().sum("v").unwrap();
        assert_eq!(summed.column_data("sum").unwrap().value(0), Value::Null);
    }

    #[test]
    fn test_int_sum_overflow_reports_missing() {
        for backend in [Backend::Native, Backend::InProcess] {
            let table = Table::from_columns_with(
                vec![
                    (
                        "k".to_string(),
                        ColumnData::Utf8(vec![
                            Some("a".to_string()),
                            Some("a".to_string()),
                            Some("b".to_string()),
                        ]),
                    ),
                    (
                        "v".to_string(),
                        ColumnData::Int64(vec![Some(i64::MAX), Some(1), Some(7)]),
                    ),
                ],
                backend,
            )
            .unwrap();
            let summed = table.group_by(&["k"]).unwrap().sum("v").unwrap();
            assert_eq!(
                pairs(&summed, "k", "sum"),
                vec![
                    (Value::Utf8("a".to_string()), Value::Null),
                    (Value::Utf8("b".to_string()), Value::Int64(7)),
                ]
            );
        }
    }
}
