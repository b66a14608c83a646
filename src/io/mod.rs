//! CSV ingestion and export

pub mod csv;

pub use csv::{read_csv, read_csv_str, write_csv, CsvOptions};
