use std::path::{Path, PathBuf};

use log::{debug, info};

use super::config::{TableConfig, TableMetadata};
use super::csv_table::write_csv;
use super::error::OutputError;
use super::layout::OutputLayout;
use super::parquet_table::write_parquet;
use super::stats::{SweepStatistics, WriterStats};
use crate::record::MeasurementRecord;

struct ParquetTarget {
    path: PathBuf,
    config: TableConfig,
    metadata: TableMetadata,
}

/// Buffers the records of one sweep and persists them in sweep order.
///
/// Every flush rewrites the complete table(s) atomically, so a crash never
/// leaves a half-written file behind, only an older complete one.
pub struct ResultWriter {
    csv_path: PathBuf,
    parquet: Option<ParquetTarget>,
    records: Vec<MeasurementRecord>,
    flush_every: Option<usize>,
    unflushed: usize,
}

impl ResultWriter {
    /// Writer for a CSV table at `csv_path`
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            parquet: None,
            records: Vec::new(),
            flush_every: None,
            unflushed: 0,
        }
    }

    /// Also write a sibling `.parquet` table
    pub fn with_parquet(mut self, config: TableConfig, metadata: TableMetadata) -> Self {
        self.parquet = Some(ParquetTarget {
            path: OutputLayout::parquet_path(&self.csv_path),
            config,
            metadata,
        });
        self
    }

    /// Flush automatically after every `n` appended records
    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = (n > 0).then_some(n);
        self
    }

    /// CSV destination
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Parquet destination, when enabled
    pub fn parquet_path(&self) -> Option<&Path> {
        self.parquet.as_ref().map(|p| p.path.as_path())
    }

    /// Records collected so far
    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    /// Number of records collected
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append the next record
    pub fn append(&mut self, record: MeasurementRecord) -> Result<(), OutputError> {
        self.records.push(record);
        self.unflushed += 1;
        if let Some(n) = self.flush_every {
            if self.unflushed >= n {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Statistics of the records collected so far
    pub fn statistics(&self) -> SweepStatistics {
        SweepStatistics::from_records(&self.records)
    }

    /// Persist all records collected so far
    pub fn flush(&mut self) -> Result<WriterStats, OutputError> {
        let csv_bytes = write_csv(&self.records, &self.csv_path)?;
        let parquet_bytes = match &self.parquet {
            Some(target) => Some(
                write_parquet(&self.records, &target.path, &target.config, &target.metadata)?
                    .file_size_bytes,
            ),
            None => None,
        };
        self.unflushed = 0;

        let stats = WriterStats {
            records_written: self.records.len(),
            missing: self.records.iter().filter(|r| r.is_missing()).count(),
            csv_path: self.csv_path.clone(),
            csv_bytes,
            parquet_path: self.parquet_path().map(Path::to_path_buf),
            parquet_bytes,
        };
        debug!("{}", stats);
        Ok(stats)
    }

    /// Final flush; consumes the writer
    pub fn finish(mut self) -> Result<WriterStats, OutputError> {
        let stats = self.flush()?;
        info!("{}", stats);
        Ok(stats)
    }
}
