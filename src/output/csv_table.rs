use std::io::BufWriter;
use std::path::Path;

use log::debug;

use super::atomic::write_atomic;
use super::error::OutputError;
use super::is_parquet_path;
use super::schema::CSV_HEADER;
use crate::record::MeasurementRecord;

/// Write records to `path` as CSV, atomically.
///
/// The header is always written, even for an empty record set. Missing power
/// values are empty fields. Returns the file size in bytes. A `.parquet`
/// destination is refused, since readers pick the format from the extension.
pub fn write_csv(records: &[MeasurementRecord], path: &Path) -> Result<u64, OutputError> {
    if is_parquet_path(path) {
        return Err(OutputError::InvalidData(format!(
            "refusing to write CSV to {}",
            path.display()
        )));
    }
    let size = write_atomic(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(CSV_HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })?;
    debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(size)
}

/// Read a CSV results table back in file order
pub fn read_csv(path: &Path) -> Result<Vec<MeasurementRecord>, OutputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let header = reader.headers()?;
    if !header.iter().eq(CSV_HEADER.iter().copied()) {
        return Err(OutputError::InvalidData(format!(
            "{}: unexpected header '{}' (expected '{}')",
            path.display(),
            header.iter().collect::<Vec<_>>().join(","),
            CSV_HEADER.join(",")
        )));
    }

    let records = reader
        .deserialize()
        .collect::<Result<Vec<MeasurementRecord>, csv::Error>>()?;
    Ok(records)
}
