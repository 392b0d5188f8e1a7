use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use uuid::Uuid;

use super::error::OutputError;
use super::schema::{keys, FORMAT_VERSION};

/// Compression options for the Parquet results table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// ZSTD compression at the given level
    Zstd(i32),
    /// Snappy compression
    Snappy,
    /// No compression
    Uncompressed,
}

impl Default for CompressionType {
    fn default() -> Self {
        Self::Zstd(3)
    }
}

impl FromStr for CompressionType {
    type Err = OutputError;

    /// Accepts `zstd`, `zstd:<level>`, `snappy` and `none`/`uncompressed`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "zstd" => Ok(Self::default()),
            "snappy" => Ok(Self::Snappy),
            "none" | "uncompressed" => Ok(Self::Uncompressed),
            other => match other.strip_prefix("zstd:").map(str::parse::<i32>) {
                Some(Ok(level)) if ZstdLevel::try_new(level).is_ok() => Ok(Self::Zstd(level)),
                _ => Err(OutputError::InvalidData(format!(
                    "unknown compression '{}' (expected zstd, zstd:<1-22>, snappy or none)",
                    s
                ))),
            },
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zstd(level) => write!(f, "zstd:{}", level),
            Self::Snappy => write!(f, "snappy"),
            Self::Uncompressed => write!(f, "none"),
        }
    }
}

/// Parquet writer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Compression codec
    pub compression: CompressionType,
    /// Whether to write column chunk statistics
    pub write_statistics: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::default(),
            write_statistics: true,
        }
    }
}

impl TableConfig {
    pub(super) fn to_writer_properties(&self, metadata: &TableMetadata) -> WriterProperties {
        let compression = match self.compression {
            CompressionType::Zstd(level) => {
                Compression::ZSTD(ZstdLevel::try_new(level).unwrap_or_default())
            }
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Uncompressed => Compression::UNCOMPRESSED,
        };

        let statistics = if self.write_statistics {
            EnabledStatistics::Chunk
        } else {
            EnabledStatistics::None
        };

        WriterProperties::builder()
            .set_compression(compression)
            .set_statistics_enabled(statistics)
            .set_key_value_metadata(Some(metadata.to_key_values()))
            .build()
    }
}

/// Footer metadata stored with every Parquet results table
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    /// Identifier shared by all tables of one sweep run
    pub run_id: Uuid,
    /// When the run started
    pub created: DateTime<Utc>,
    /// LO power setting of the table
    pub lo_power_setting: i32,
    /// JSON sweep plan, when known
    pub sweep_plan: Option<String>,
}

impl TableMetadata {
    /// Metadata for a new run with a fresh run id
    pub fn new(run_id: Uuid, lo_power_setting: i32) -> Self {
        Self {
            run_id,
            created: Utc::now(),
            lo_power_setting,
            sweep_plan: None,
        }
    }

    /// Attach the JSON sweep plan
    pub fn with_sweep_plan(mut self, plan_json: impl Into<String>) -> Self {
        self.sweep_plan = Some(plan_json.into());
        self
    }

    fn to_key_values(&self) -> Vec<KeyValue> {
        let mut pairs = vec![
            (keys::FORMAT_VERSION, FORMAT_VERSION.to_string()),
            (
                keys::WRITER,
                format!("lo-sweep {}", env!("CARGO_PKG_VERSION")),
            ),
            (keys::CREATED, self.created.to_rfc3339()),
            (keys::RUN_ID, self.run_id.to_string()),
            (keys::LO_POWER_SETTING, self.lo_power_setting.to_string()),
        ];
        if let Some(plan) = &self.sweep_plan {
            pairs.push((keys::SWEEP_PLAN, plan.clone()));
        }
        pairs
            .into_iter()
            .map(|(key, value)| KeyValue {
                key: key.to_string(),
                value: Some(value),
            })
            .collect()
    }
}
