//! # Result Tables
//!
//! Sweep results are written as a flat table with four columns:
//!
//! | Column             | CSV            | Parquet                      |
//! |--------------------|----------------|------------------------------|
//! | `frequency_mhz`    | decimal        | Float64                      |
//! | `power_dbm`        | empty if none  | Float64 (nullable)           |
//! | `timestamp`        | ISO-8601, µs   | Timestamp(Microsecond)       |
//! | `lo_power_setting` | integer        | Int32                        |
//!
//! CSV is always written. The Parquet table is an optional, self-describing
//! copy of the same rows: its footer carries the run id, the LO power setting
//! and the JSON sweep plan.
//!
//! All files are written atomically through a temporary sibling file.

mod atomic;
mod config;
mod csv_table;
mod error;
mod layout;
mod parquet_table;
pub mod schema;
mod stats;
mod writer;

#[cfg(test)]
mod tests;

pub use config::{CompressionType, TableConfig, TableMetadata};
pub use csv_table::{read_csv, write_csv};
pub use error::OutputError;
pub use layout::{OutputLayout, DEFAULT_OUTPUT_DIR, DEFAULT_TIMESTAMP_FORMAT};
pub use parquet_table::{
    read_parquet, read_parquet_metadata, records_to_batch, write_parquet, ParquetWriteInfo,
};
pub use stats::{SweepStatistics, WriterStats};
pub use writer::ResultWriter;

use std::path::Path;

/// True when `path` ends in `.parquet` (any case)
pub fn is_parquet_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Read a results table, choosing the format from the file extension
pub fn read_table(path: &Path) -> Result<Vec<crate::record::MeasurementRecord>, OutputError> {
    if is_parquet_path(path) {
        read_parquet(path)
    } else {
        read_csv(path)
    }
}
