use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use super::progress::format_duration;
use crate::output::SweepStatistics;

/// A point recorded without a reading
#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    /// Point index within the sweep
    pub index: usize,
    /// Point frequency
    pub frequency_mhz: f64,
    /// Last error seen for the point
    pub reason: String,
}

/// Outcome of one power level
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    /// LO power setting (dBm)
    pub lo_power: i32,
    /// Points in the plan
    pub planned: usize,
    /// Rows written, including missing points
    pub recorded: usize,
    /// Points without a reading
    pub failures: Vec<PointFailure>,
    /// CSV table
    pub csv_path: PathBuf,
    /// Parquet table, when enabled
    pub parquet_path: Option<PathBuf>,
    /// Wall-clock duration of the pass
    pub elapsed: Duration,
    /// Whether every planned point was recorded
    pub completed: bool,
    /// Statistics over the recorded rows
    pub statistics: SweepStatistics,
}

impl PassSummary {
    /// Rows that carry a reading
    pub fn measured(&self) -> usize {
        self.recorded - self.failures.len()
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LO {:+} dBm: {}/{} points recorded ({} missing) in {}{} -> {}",
            self.lo_power,
            self.recorded,
            self.planned,
            self.failures.len(),
            format_duration(self.elapsed),
            if self.completed { "" } else { ", incomplete" },
            self.csv_path.display()
        )
    }
}

/// Summary of a whole run, available after success or failure
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    /// Run identifier written to Parquet footers
    pub run_id: Uuid,
    /// One entry per power level started
    pub passes: Vec<PassSummary>,
}

impl SweepReport {
    /// True when every started pass completed
    pub fn is_complete(&self) -> bool {
        !self.passes.is_empty() && self.passes.iter().all(|p| p.completed)
    }

    /// Missing points over all passes
    pub fn missing(&self) -> usize {
        self.passes.iter().map(|p| p.failures.len()).sum()
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        for pass in &self.passes {
            writeln!(f, "  {}", pass)?;
        }
        Ok(())
    }
}
