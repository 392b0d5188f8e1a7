//! Result file naming.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime};

use super::error::OutputError;
use super::is_parquet_path;

/// Default directory for generated file names
pub const DEFAULT_OUTPUT_DIR: &str = "results";

/// Default timestamp pattern in generated file names
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Decides where each power level's results go.
///
/// - explicit path, one power level: that path
/// - explicit path, several levels: `<stem>_<+p>dBm.<ext>` beside it
/// - no explicit path: `<dir>/lo_power_sweep_<timestamp>_<+p>dBm.csv`
///
/// An explicit `.parquet` path names the Parquet table; the CSV table goes to
/// the same name with a `.csv` extension.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    explicit: Option<PathBuf>,
    output_dir: PathBuf,
    timestamp_format: String,
    started: NaiveDateTime,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(None, DEFAULT_OUTPUT_DIR)
    }
}

impl OutputLayout {
    /// Layout stamped with the current local time
    pub fn new(explicit: Option<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            explicit,
            output_dir: output_dir.into(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            started: Local::now().naive_local(),
        }
    }

    /// Use another strftime pattern for generated names
    pub fn with_timestamp_format(mut self, format: &str) -> Result<Self, OutputError> {
        let invalid = StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
        if invalid || format.is_empty() {
            return Err(OutputError::InvalidData(format!(
                "invalid timestamp format '{}'",
                format
            )));
        }
        self.timestamp_format = format.to_string();
        Ok(self)
    }

    /// Fix the run start time used in generated names
    pub fn with_start_time(mut self, started: NaiveDateTime) -> Self {
        self.started = started;
        self
    }

    /// Directory used for generated names
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// True when the explicit path asks for a Parquet table
    pub fn wants_parquet(&self) -> bool {
        self.explicit.as_deref().is_some_and(is_parquet_path)
    }

    /// CSV path for one power level
    pub fn csv_path(&self, lo_power: i32, multi_power: bool) -> PathBuf {
        let explicit = self.explicit.as_ref().map(|path| {
            if is_parquet_path(path) {
                path.with_extension("csv")
            } else {
                path.clone()
            }
        });
        match &explicit {
            Some(path) if !multi_power => path.clone(),
            Some(path) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "lo_power_sweep".to_string());
                let name = match path.extension() {
                    Some(ext) => format!("{}_{:+}dBm.{}", stem, lo_power, ext.to_string_lossy()),
                    None => format!("{}_{:+}dBm", stem, lo_power),
                };
                path.with_file_name(name)
            }
            None => self.output_dir.join(format!(
                "lo_power_sweep_{}_{:+}dBm.csv",
                self.started.format(&self.timestamp_format),
                lo_power
            )),
        }
    }

    /// Sibling Parquet path of a CSV path
    pub fn parquet_path(csv_path: &Path) -> PathBuf {
        csv_path.with_extension("parquet")
    }
}
