//! # Sweep Plan
//!
//! A [`SweepPlan`] is the validated, read-only description of one measurement run:
//!
//! - the ordered list of LO frequencies ([`FrequencyList`])
//! - one or more LO output power levels, each producing a full sweep
//! - the settling delay between retuning the source and measuring
//! - the analyzer acquisition settings ([`AcquisitionSettings`])
//!
//! All validation happens here, before any device is opened.

mod acquisition;
mod error;
mod frequency;


use std::time::Duration;

use serde::{Serialize, Serializer};

pub use acquisition::{
    AcquisitionSettings, Attenuation, Averaging, Rbw, MAX_ACQUISITION_POINTS, MAX_ATTENUATION_DB,
};
pub use error::PlanError;
pub use frequency::{FrequencyList, MAX_POINTS, MIN_STEP_MHZ};

/// Validated description of a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPlan {
    frequencies: FrequencyList,
    power_levels: Vec<i32>,
    #[serde(rename = "settling_time_s", serialize_with = "serialize_secs")]
    settling_time: Duration,
    acquisition: AcquisitionSettings,
}

impl SweepPlan {
    /// Build a plan, rejecting empty or duplicated power levels and invalid
    /// acquisition settings.
    pub fn new(
        frequencies: FrequencyList,
        power_levels: Vec<i32>,
        settling_time: Duration,
        acquisition: AcquisitionSettings,
    ) -> Result<Self, PlanError> {
        if power_levels.is_empty() {
            return Err(PlanError::NoPowerLevels);
        }
        for (i, level) in power_levels.iter().enumerate() {
            if power_levels[..i].contains(level) {
                return Err(PlanError::DuplicatePowerLevel(*level));
            }
        }
        acquisition.validate()?;

        Ok(Self {
            frequencies,
            power_levels,
            settling_time,
            acquisition,
        })
    }

    /// Frequencies in sweep order
    pub fn frequencies(&self) -> &FrequencyList {
        &self.frequencies
    }

    /// LO power levels in dBm, one full sweep each
    pub fn power_levels(&self) -> &[i32] {
        &self.power_levels
    }

    /// True when more than one power level is configured
    pub fn is_multi_power(&self) -> bool {
        self.power_levels.len() > 1
    }

    /// Delay between retuning the source and measuring
    pub fn settling_time(&self) -> Duration {
        self.settling_time
    }

    /// Analyzer acquisition settings
    pub fn acquisition(&self) -> &AcquisitionSettings {
        &self.acquisition
    }

    /// Total number of measurements across all power levels
    pub fn total_points(&self) -> usize {
        self.frequencies.len() * self.power_levels.len()
    }

    /// Serialize to JSON for the Parquet footer
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
