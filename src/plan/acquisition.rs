//! Spectrum-analyzer acquisition parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::PlanError;

/// Largest hop/scan point count the tinySA accepts
pub const MAX_ACQUISITION_POINTS: usize = 450;

/// Largest input attenuation in dB
pub const MAX_ATTENUATION_DB: u8 = 31;

/// Resolution bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rbw {
    /// Let the analyzer pick the RBW from the span
    #[default]
    Auto,
    /// Fixed RBW in kHz
    Khz(f64),
}

impl FromStr for Rbw {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Rbw::Auto);
        }
        let khz: f64 = s.parse().map_err(|_| PlanError::InvalidAcquisition {
            name: "rbw",
            reason: format!("expected 'auto' or a value in kHz, got '{}'", s),
        })?;
        if !khz.is_finite() || khz <= 0.0 {
            return Err(PlanError::InvalidAcquisition {
                name: "rbw",
                reason: format!("{} kHz is not a positive bandwidth", khz),
            });
        }
        Ok(Rbw::Khz(khz))
    }
}

impl fmt::Display for Rbw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rbw::Auto => write!(f, "auto"),
            Rbw::Khz(khz) => write!(f, "{}", khz),
        }
    }
}

/// Input attenuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attenuation {
    /// Automatic attenuation
    #[default]
    Auto,
    /// Fixed attenuation in dB (0-31)
    Db(u8),
}

impl FromStr for Attenuation {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Attenuation::Auto);
        }
        match s.parse::<u8>() {
            Ok(db) if db <= MAX_ATTENUATION_DB => Ok(Attenuation::Db(db)),
            _ => Err(PlanError::InvalidAcquisition {
                name: "attenuation",
                reason: format!(
                    "expected 'auto' or 0-{} dB, got '{}'",
                    MAX_ATTENUATION_DB, s
                ),
            }),
        }
    }
}

impl fmt::Display for Attenuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attenuation::Auto => write!(f, "auto"),
            Attenuation::Db(db) => write!(f, "{}", db),
        }
    }
}

/// Trace averaging supported by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Averaging {
    /// Single acquisition
    Off,
    /// Average of 4 acquisitions
    #[default]
    Four,
    /// Average of 16 acquisitions
    Sixteen,
}

impl Averaging {
    /// Number of acquisitions averaged
    pub fn count(&self) -> u32 {
        match self {
            Averaging::Off => 1,
            Averaging::Four => 4,
            Averaging::Sixteen => 16,
        }
    }
}

impl TryFrom<u32> for Averaging {
    type Error = PlanError;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        match count {
            1 => Ok(Averaging::Off),
            4 => Ok(Averaging::Four),
            16 => Ok(Averaging::Sixteen),
            other => Err(PlanError::InvalidAcquisition {
                name: "averaging",
                reason: format!("must be 1, 4 or 16 (got {})", other),
            }),
        }
    }
}

impl From<Averaging> for u32 {
    fn from(averaging: Averaging) -> Self {
        averaging.count()
    }
}

/// Analyzer settings applied once before a sweep starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Width of the window searched for the peak, in MHz
    pub span_mhz: f64,
    /// Resolution bandwidth
    pub rbw: Rbw,
    /// Trace averaging
    pub averaging: Averaging,
    /// Input attenuation
    pub attenuation: Attenuation,
    /// Points per hop acquisition
    pub points: usize,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            span_mhz: 1.0,
            rbw: Rbw::Auto,
            averaging: Averaging::Four,
            attenuation: Attenuation::Auto,
            // Fewer points than a full trace keeps each hop fast
            points: 51,
        }
    }
}

impl AcquisitionSettings {
    /// Check ranges that the types alone cannot express
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.span_mhz.is_finite() || self.span_mhz <= 0.0 {
            return Err(PlanError::InvalidAcquisition {
                name: "span",
                reason: format!("{} MHz is not a positive span", self.span_mhz),
            });
        }
        if self.points < 2 || self.points > MAX_ACQUISITION_POINTS {
            return Err(PlanError::InvalidAcquisition {
                name: "points",
                reason: format!(
                    "must be between 2 and {} (got {})",
                    MAX_ACQUISITION_POINTS, self.points
                ),
            });
        }
        if let Rbw::Khz(khz) = self.rbw {
            if !khz.is_finite() || khz <= 0.0 {
                return Err(PlanError::InvalidAcquisition {
                    name: "rbw",
                    reason: format!("{} kHz is not a positive bandwidth", khz),
                });
            }
        }
        if let Attenuation::Db(db) = self.attenuation {
            if db > MAX_ATTENUATION_DB {
                return Err(PlanError::InvalidAcquisition {
                    name: "attenuation",
                    reason: format!("{} dB exceeds {} dB", db, MAX_ATTENUATION_DB),
                });
            }
        }
        Ok(())
    }
}
