//! Per-point measurement results.

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::device::PeakReading;

/// Result of measuring one frequency point
#[derive(Debug, Clone, PartialEq)]
pub enum PointOutcome {
    /// The analyzer returned a peak
    Measured(PeakReading),
    /// No usable reading; the row is kept with an empty power value
    Missing {
        /// Why the point has no reading
        reason: String,
    },
}

impl PointOutcome {
    /// Measured power, if any
    pub fn power_dbm(&self) -> Option<f64> {
        match self {
            PointOutcome::Measured(reading) => Some(reading.power_dbm),
            PointOutcome::Missing { .. } => None,
        }
    }
}

/// One row of the results table.
///
/// Field order is the column order of the CSV and Parquet outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    frequency_mhz: f64,
    power_dbm: Option<f64>,
    #[serde(with = "timestamp_format")]
    timestamp: NaiveDateTime,
    lo_power_setting: i32,
}

impl MeasurementRecord {
    /// Build a record from its parts. The timestamp is truncated to
    /// microseconds, the resolution of both output formats.
    pub fn new(
        frequency_mhz: f64,
        power_dbm: Option<f64>,
        timestamp: NaiveDateTime,
        lo_power_setting: i32,
    ) -> Self {
        Self {
            frequency_mhz,
            power_dbm,
            timestamp: timestamp.trunc_subsecs(6),
            lo_power_setting,
        }
    }

    /// Record an outcome at the current local time
    pub fn from_outcome(frequency_mhz: f64, outcome: &PointOutcome, lo_power_setting: i32) -> Self {
        Self::new(
            frequency_mhz,
            outcome.power_dbm(),
            Local::now().naive_local(),
            lo_power_setting,
        )
    }

    /// Commanded LO frequency in MHz
    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_mhz
    }

    /// Measured peak power in dBm, `None` for missing points
    pub fn power_dbm(&self) -> Option<f64> {
        self.power_dbm
    }

    /// Local wall-clock time of the measurement
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// LO power setting in dBm for the sweep this row belongs to
    pub fn lo_power_setting(&self) -> i32 {
        self.lo_power_setting
    }

    /// True when the point has no reading
    pub fn is_missing(&self) -> bool {
        self.power_dbm.is_none()
    }
}

/// ISO-8601 with exactly six fractional digits
pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, PARSE_FORMAT).map_err(serde::de::Error::custom)
    }
}
