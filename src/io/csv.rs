//! CSV reader/writer with per-column type inference
//!
//! Reading is a blocking, quote-aware parse (RFC-style doubled quotes,
//! embedded separators and newlines inside quoted fields). Each column's
//! type is inferred in priority order Int64 > Float64 > Boolean > Utf8
//! over its non-missing cells; a column with no non-missing cell infers
//! Null. The missing-token vocabulary on read is the empty string, `NA`,
//! `na` and `N/A` (exact match after trim); on write, missing serializes
//! as `NA`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::{ColumnData, Value};
use crate::native::Backend;
use crate::table::Table;
use crate::{FrameError, Result};

/// Options for [`read_csv`]
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field separator byte
    pub separator: u8,
    /// Physical lines to skip before the header
    pub skip_lines: usize,
    /// Treat the first parsed row as data; columns are named `c0..cN-1`
    pub first_row_as_data: bool,
    /// Backend for the resulting table
    pub backend: Backend,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            skip_lines: 0,
            first_row_as_data: false,
            backend: Backend::Native,
        }
    }
}

/// Read a CSV file into a table
pub fn read_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<Table> {
    let text = fs::read_to_string(path)?;
    read_csv_str(&text, options)
}

/// Parse CSV text into a table
pub fn read_csv_str(text: &str, options: &CsvOptions) -> Result<Table> {
    let body = skip_physical_lines(text, options.skip_lines);
    let records = parse_records(body, options.separator as char)?;
    if records.is_empty() {
        return Err(FrameError::Csv("no rows in input".to_string()));
    }

    let (names, data_rows, first_data_record) = if options.first_row_as_data {
        let width = records[0].len();
        let names = (0..width).map(|i| format!("c{i}")).collect::<Vec<_>>();
        (names, &records[..], 1usize)
    } else {
        (records[0].clone(), &records[1..], 2usize)
    };

    let ncols = names.len();
    for (offset, record) in data_rows.iter().enumerate() {
        if record.len() != ncols {
            return Err(FrameError::CsvShape {
                row: first_data_record + offset,
                expected: ncols,
                actual: record.len(),
            });
        }
    }

    let columns: Vec<(String, ColumnData)> = names
        .into_iter()
        .enumerate()
        .map(|(col, name)| {
            let cells: Vec<&str> = data_rows.iter().map(|r| r[col].as_str()).collect();
            (name, infer_column(&cells))
        })
        .collect();
    Table::from_columns_with(columns, options.backend)
}

/// Write a table as CSV. A cell is quoted iff it contains the separator,
/// a double quote, or a newline; embedded quotes are doubled.
pub fn write_csv(table: &Table, path: impl AsRef<Path>, separator: u8) -> Result<()> {
    let sep = separator as char;
    let columns: Vec<ColumnData> = table
        .schema()
        .fields()
        .iter()
        .map(|f| table.column_data(&f.name))
        .collect::<Result<_>>()?;

    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);

    let header: Vec<String> = table
        .schema()
        .fields()
        .iter()
        .map(|f| quote_if_needed(f.name.clone(), sep))
        .collect();
    writeln!(out, "{}", header.join(&sep.to_string()))?;

    for row in 0..table.nrows() {
        let cells: Vec<String> = columns
            .iter()
            .map(|col| format_cell(col.value(row), sep))
            .collect();
        writeln!(out, "{}", cells.join(&sep.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

fn skip_physical_lines(text: &str, count: usize) -> &str {
    let mut rest = text;
    for _ in 0..count {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// Quote-aware record splitter. Handles doubled quotes and separators or
/// newlines inside quoted fields; CRLF line endings are normalized.
fn parse_records(text: &str, sep: char) -> Result<Vec<Vec<String>>> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' && field.is_empty() && !field_was_quoted {
            in_quotes = true;
            field_was_quoted = true;
        } else if c == sep {
            record.push(std::mem::take(&mut field));
            field_was_quoted = false;
        } else if c == '\n' {
            if !field_was_quoted && field.ends_with('\r') {
                field.pop();
            }
            record.push(std::mem::take(&mut field));
            records.push(std::mem::take(&mut record));
            field_was_quoted = false;
        } else {
            field.push(c);
        }
    }
    if in_quotes {
        return Err(FrameError::Csv("unterminated quoted field".to_string()));
    }
    // Final record without a trailing newline
    if !field.is_empty() || !record.is_empty() || field_was_quoted {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn is_missing(cell: &str) -> bool {
    matches!(cell.trim(), "" | "NA" | "na" | "N/A")
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Infer the most specific type every non-missing cell parses as
fn infer_column(cells: &[&str]) -> ColumnData {
    let present: Vec<&str> = cells
        .iter()
        .filter(|c| !is_missing(c))
        .map(|c| c.trim())
        .collect();
    if present.is_empty() {
        return ColumnData::Null(cells.len());
    }

    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        return ColumnData::Int64(
            cells
                .iter()
                .map(|c| {
                    if is_missing(c) {
                        None
                    } else {
                        c.trim().parse::<i64>().ok()
                    }
                })
                .collect(),
        );
    }
    if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        return ColumnData::Float64(
            cells
                .iter()
                .map(|c| {
                    if is_missing(c) {
                        None
                    } else {
                        c.trim().parse::<f64>().ok()
                    }
                })
                .collect(),
        );
    }
    if present.iter().all(|c| parse_bool(c).is_some()) {
        return ColumnData::Boolean(
            cells
                .iter()
                .map(|c| if is_missing(c) { None } else { parse_bool(c.trim()) })
                .collect(),
        );
    }
    ColumnData::Utf8(
        cells
            .iter()
            .map(|c| {
                if is_missing(c) {
                    None
                } else {
                    Some(c.to_string())
                }
            })
            .collect(),
    )
}

fn format_cell(value: Value, sep: char) -> String {
    match value {
        Value::Int64(v) => v.to_string(),
        // Whole floats keep a decimal point so the column re-infers as
        // Float64, not Int64.
        Value::Float64(v) if v.is_finite() && v == v.trunc() => format!("{v:.1}"),
        Value::Float64(v) => format!("{v}"),
        Value::Boolean(v) => v.to_string(),
        Value::Utf8(v) => quote_if_needed(v, sep),
        Value::Null => "NA".to_string(),
    }
}

fn quote_if_needed(cell: String, sep: char) -> String {
    if cell.contains(sep) || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell
    }
}
