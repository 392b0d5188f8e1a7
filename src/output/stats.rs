use std::fmt;
use std::path::PathBuf;

use crate::record::MeasurementRecord;

/// Summary of the power readings of one sweep
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepStatistics {
    /// Number of records
    pub total: usize,
    /// Records with a power reading
    pub valid: usize,
    /// Lowest reading (dBm) and its frequency (MHz)
    pub min: Option<(f64, f64)>,
    /// Highest reading (dBm) and its frequency (MHz)
    pub max: Option<(f64, f64)>,
    /// Mean power (dBm)
    pub mean_dbm: Option<f64>,
    /// Sample standard deviation (dB); needs two readings
    pub std_dbm: Option<f64>,
}

impl SweepStatistics {
    /// Compute statistics over the non-missing readings
    pub fn from_records(records: &[MeasurementRecord]) -> Self {
        let readings: Vec<(f64, f64)> = records
            .iter()
            .filter_map(|r| r.power_dbm().map(|p| (p, r.frequency_mhz())))
            .collect();

        let min = readings.iter().copied().min_by(|a, b| a.0.total_cmp(&b.0));
        let max = readings.iter().copied().max_by(|a, b| a.0.total_cmp(&b.0));

        let n = readings.len();
        let mean_dbm = (n > 0).then(|| readings.iter().map(|r| r.0).sum::<f64>() / n as f64);
        let std_dbm = match mean_dbm {
            Some(mean) if n > 1 => {
                let ss: f64 = readings.iter().map(|r| (r.0 - mean).powi(2)).sum();
                Some((ss / (n - 1) as f64).sqrt())
            }
            _ => None,
        };

        Self {
            total: records.len(),
            valid: n,
            min,
            max,
            mean_dbm,
            std_dbm,
        }
    }

    /// Records without a reading
    pub fn missing(&self) -> usize {
        self.total - self.valid
    }

    /// Difference between the highest and lowest reading (dB)
    pub fn peak_to_peak_db(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(max.0 - min.0),
            _ => None,
        }
    }
}

impl fmt::Display for SweepStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Points: {} ({} valid, {} missing)", self.total, self.valid, self.missing())?;
        match (self.min, self.max, self.mean_dbm) {
            (Some(min), Some(max), Some(mean)) => {
                writeln!(f, "Min:    {:.2} dBm at {:.3} MHz", min.0, min.1)?;
                writeln!(f, "Max:    {:.2} dBm at {:.3} MHz", max.0, max.1)?;
                writeln!(f, "Mean:   {:.2} dBm", mean)?;
                if let Some(std) = self.std_dbm {
                    writeln!(f, "Std:    {:.2} dB", std)?;
                }
                write!(f, "P-P:    {:.2} dB", max.0 - min.0)
            }
            _ => write!(f, "No valid readings"),
        }
    }
}

/// Statistics from a flush of the result writer
#[derive(Debug, Clone, PartialEq)]
pub struct WriterStats {
    /// Rows in the CSV table
    pub records_written: usize,
    /// Rows without a reading
    pub missing: usize,
    /// CSV file
    pub csv_path: PathBuf,
    /// CSV size in bytes
    pub csv_bytes: u64,
    /// Parquet file, when enabled
    pub parquet_path: Option<PathBuf>,
    /// Parquet size in bytes
    pub parquet_bytes: Option<u64>,
}

impl fmt::Display for WriterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} records ({} missing) to {}",
            self.records_written,
            self.missing,
            self.csv_path.display()
        )?;
        if let Some(path) = &self.parquet_path {
            write!(f, " and {}", path.display())?;
        }
        Ok(())
    }
}
