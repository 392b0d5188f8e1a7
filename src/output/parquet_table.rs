use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, TimestampMicrosecondArray};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::atomic::write_atomic;
use super::config::{TableConfig, TableMetadata};
use super::error::OutputError;
use super::schema::{self, results_schema};
use crate::record::MeasurementRecord;

/// Outcome of writing one Parquet table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParquetWriteInfo {
    /// Rows written
    pub rows: usize,
    /// Row groups in the file
    pub row_groups: usize,
    /// File size in bytes
    pub file_size_bytes: u64,
}

/// Convert records to a single Arrow batch
pub fn records_to_batch(records: &[MeasurementRecord]) -> Result<RecordBatch, OutputError> {
    let frequency: Float64Array = records.iter().map(|r| Some(r.frequency_mhz())).collect();
    let power: Float64Array = records.iter().map(|r| r.power_dbm()).collect();
    let timestamp: TimestampMicrosecondArray = records
        .iter()
        .map(|r| Some(r.timestamp().and_utc().timestamp_micros()))
        .collect();
    let lo_power: Int32Array = records.iter().map(|r| Some(r.lo_power_setting())).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(frequency),
        Arc::new(power),
        Arc::new(timestamp),
        Arc::new(lo_power),
    ];
    Ok(RecordBatch::try_new(results_schema(), columns)?)
}

/// Write records to `path` as a Parquet table with footer metadata, atomically
pub fn write_parquet(
    records: &[MeasurementRecord],
    path: &Path,
    config: &TableConfig,
    metadata: &TableMetadata,
) -> Result<ParquetWriteInfo, OutputError> {
    let batch = records_to_batch(records)?;
    let props = config.to_writer_properties(metadata);
    let mut row_groups = 0;

    let file_size_bytes = write_atomic(path, |file| {
        let mut writer = ArrowWriter::try_new(file, results_schema(), Some(props))?;
        if batch.num_rows() > 0 {
            writer.write(&batch)?;
        }
        let file_metadata = writer.close()?;
        row_groups = file_metadata.row_groups.len();
        Ok(())
    })?;

    debug!(
        "Wrote {} rows in {} row group(s) to {}",
        records.len(),
        row_groups,
        path.display()
    );
    Ok(ParquetWriteInfo {
        rows: records.len(),
        row_groups,
        file_size_bytes,
    })
}

/// Read a Parquet results table back in file order
pub fn read_parquet(path: &Path) -> Result<Vec<MeasurementRecord>, OutputError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let frequency = column::<Float64Array>(&batch, schema::FREQUENCY_MHZ)?;
        let power = column::<Float64Array>(&batch, schema::POWER_DBM)?;
        let timestamp = column::<TimestampMicrosecondArray>(&batch, schema::TIMESTAMP)?;
        let lo_power = column::<Int32Array>(&batch, schema::LO_POWER_SETTING)?;

        records.reserve(batch.num_rows());
        for i in 0..batch.num_rows() {
            let micros = timestamp.value(i);
            let ts = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| {
                    OutputError::InvalidData(format!("timestamp {} out of range", micros))
                })?
                .naive_utc();
            let power_dbm = if power.is_null(i) {
                None
            } else {
                Some(power.value(i))
            };
            records.push(MeasurementRecord::new(
                frequency.value(i),
                power_dbm,
                ts,
                lo_power.value(i),
            ));
        }
    }
    Ok(records)
}

/// Footer key/value metadata of a Parquet results table
pub fn read_parquet_metadata(path: &Path) -> Result<HashMap<String, String>, OutputError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let pairs = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|kvs| {
            kvs.iter()
                .filter_map(|kv| kv.value.clone().map(|v| (kv.key.clone(), v)))
                .collect()
        })
        .unwrap_or_default();
    Ok(pairs)
}

fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, OutputError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| OutputError::InvalidData(format!("missing or mistyped column '{}'", name)))
}
