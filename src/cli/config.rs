//! TOML configuration file support.
//!
//! Every key is optional; command-line flags override file values, and file
//! values override the built-in defaults.
//!
//! ```toml
//! # lo-sweep.toml
//! [devices]
//! source = "/dev/ttyUSB0"
//! analyzer = "auto"
//!
//! [sweep]
//! freq_start = 900.0
//! freq_stop = 960.0
//! freq_step = 0.2
//! power_levels = [5, -10]
//! settling_time = 0.1
//! retries = 1
//!
//! [analyzer]
//! span = 1.0
//! rbw = "auto"
//! averaging = 4
//! attenuation = 10
//! points = 51
//!
//! [output]
//! output_dir = "results"
//! parquet = true
//! compression = "zstd:9"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use lo_sweep::output::{CompressionType, OutputError};
use lo_sweep::plan::PlanError;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "lo-sweep.toml";

/// Problems with user-supplied settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A setting has an unusable value
    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The resulting sweep plan is invalid
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

impl From<OutputError> for ConfigError {
    fn from(e: OutputError) -> Self {
        ConfigError::invalid("output setting", e)
    }
}

/// Root configuration structure for lo-sweep.toml files.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Serial ports and link timing
    #[serde(default)]
    pub devices: DevicesConfig,

    /// Frequencies, power levels and timing
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Analyzer acquisition settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Result files
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[devices]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevicesConfig {
    /// Source port or "auto"
    pub source: Option<String>,
    /// Analyzer port or "auto"
    pub analyzer: Option<String>,
    /// Source baud rate
    pub source_baud: Option<u32>,
    /// Source reply timeout (seconds)
    pub reply_timeout: Option<f64>,
    /// Wait after opening the source port (seconds)
    pub reset_delay: Option<f64>,
    /// Analyzer acquisition timeout (seconds)
    pub measurement_timeout: Option<f64>,
}

/// `[sweep]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Start frequency (MHz)
    pub freq_start: Option<f64>,
    /// Stop frequency (MHz)
    pub freq_stop: Option<f64>,
    /// Step (MHz)
    pub freq_step: Option<f64>,
    /// Explicit frequency list (MHz), instead of a range
    pub frequencies: Option<Vec<f64>>,
    /// Single LO power level (dBm)
    pub power: Option<i32>,
    /// Several LO power levels (dBm), one sweep each
    pub power_levels: Option<Vec<i32>>,
    /// Settling time after retuning (seconds)
    pub settling_time: Option<f64>,
    /// Extra attempts for a failed point
    pub retries: Option<u32>,
}

/// `[analyzer]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Measurement span (MHz)
    pub span: Option<f64>,
    /// RBW in kHz or "auto"
    pub rbw: Option<NumberOrText>,
    /// Averaging: 1, 4 or 16
    pub averaging: Option<u32>,
    /// Attenuation in dB or "auto"
    pub attenuation: Option<NumberOrText>,
    /// Points per measurement
    pub points: Option<usize>,
}

/// `[output]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory for generated file names
    pub output_dir: Option<PathBuf>,
    /// Fixed output file
    pub output: Option<PathBuf>,
    /// Also write Parquet tables
    pub parquet: Option<bool>,
    /// Parquet compression
    pub compression: Option<String>,
    /// strftime pattern for generated file names
    pub timestamp_format: Option<String>,
    /// Persist results every N points
    pub flush_every: Option<usize>,
}

/// A TOML value that may be written as a number or a string (`10` or `"auto"`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
}

impl fmt::Display for NumberOrText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberOrText::Number(n) => write!(f, "{}", n),
            NumberOrText::Text(s) => f.write_str(s),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })
    }

    /// The explicit file, else `lo-sweep.toml` in the working directory if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                Self::from_file(path)
            }
            None => {
                let implicit = Path::new(DEFAULT_CONFIG_FILE);
                if implicit.is_file() {
                    debug!("Loading config from {}", implicit.display());
                    Self::from_file(implicit)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parquet compression from the file, if set
    pub fn compression(&self) -> Result<Option<CompressionType>, ConfigError> {
        self.output
            .compression
            .as_deref()
            .map(str::parse::<CompressionType>)
            .transpose()
            .map_err(ConfigError::from)
    }
}

/// Seconds from a config or CLI value
pub fn duration_from_secs(key: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::invalid(
            key,
            format!("{} s is not a valid duration", secs),
        ));
    }
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [devices]
            source = "/dev/ttyUSB0"
            analyzer = "auto"
            reset_delay = 1.5

            [sweep]
            freq_start = 910.0
            freq_stop = 950.0
            freq_step = 0.5
            power_levels = [5, -4]
            settling_time = 0.2

            [analyzer]
            span = 2.0
            rbw = 100
            averaging = 16
            attenuation = "auto"

            [output]
            parquet = true
            compression = "snappy"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.devices.source.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.devices.reset_delay, Some(1.5));
        assert_eq!(config.sweep.freq_step, Some(0.5));
        assert_eq!(config.sweep.power_levels, Some(vec![5, -4]));
        assert_eq!(config.analyzer.rbw, Some(NumberOrText::Number(100.0)));
        assert_eq!(config.analyzer.rbw.as_ref().unwrap().to_string(), "100");
        assert_eq!(
            config.analyzer.attenuation,
            Some(NumberOrText::Text("auto".into()))
        );
        assert_eq!(config.output.parquet, Some(true));
        assert_eq!(config.compression().unwrap(), Some(CompressionType::Snappy));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [sweep]
            power = -10
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.sweep.power, Some(-10));
        assert_eq!(config.sweep.freq_start, None);
        assert_eq!(config.devices.source, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.sweep.power, None);
        assert_eq!(config.compression().unwrap(), None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::from_str("[sweep]\nfreq_begin = 900.0\n").is_err());
        assert!(Config::from_str("[plotting]\nenabled = true\n").is_err());
    }

    #[test]
    fn test_bad_compression() {
        let config = Config::from_str("[output]\ncompression = \"lz4\"\n").unwrap();
        assert!(matches!(
            config.compression(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/lo-sweep.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(
            duration_from_secs("settling_time", 0.25).unwrap(),
            Duration::from_millis(250)
        );
        assert!(duration_from_secs("settling_time", -1.0).is_err());
        assert!(duration_from_secs("settling_time", f64::NAN).is_err());
    }
}
