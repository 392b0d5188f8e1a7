//! Column names, Arrow schema and footer metadata keys of the results table.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};

/// Commanded LO frequency (MHz)
pub const FREQUENCY_MHZ: &str = "frequency_mhz";
/// Measured peak power (dBm), empty for missing points
pub const POWER_DBM: &str = "power_dbm";
/// Local wall-clock time of the measurement
pub const TIMESTAMP: &str = "timestamp";
/// LO power setting of the sweep (dBm)
pub const LO_POWER_SETTING: &str = "lo_power_setting";

/// CSV header, in column order
pub const CSV_HEADER: [&str; 4] = [FREQUENCY_MHZ, POWER_DBM, TIMESTAMP, LO_POWER_SETTING];

/// Version of the results table layout
pub const FORMAT_VERSION: &str = "1.0";

/// Parquet footer key/value metadata keys
pub mod keys {
    /// Table layout version
    pub const FORMAT_VERSION: &str = "lo_sweep:format_version";
    /// Writing software and version
    pub const WRITER: &str = "lo_sweep:writer";
    /// RFC 3339 creation time (UTC)
    pub const CREATED: &str = "lo_sweep:created";
    /// UUID of the sweep run, shared by all files of one invocation
    pub const RUN_ID: &str = "lo_sweep:run_id";
    /// LO power setting of this table (dBm)
    pub const LO_POWER_SETTING: &str = "lo_sweep:lo_power_setting";
    /// Sweep plan as JSON
    pub const SWEEP_PLAN: &str = "lo_sweep:sweep_plan";
}

/// Arrow schema of the results table
pub fn results_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(FREQUENCY_MHZ, DataType::Float64, false),
        Field::new(POWER_DBM, DataType::Float64, true),
        Field::new(
            TIMESTAMP,
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new(LO_POWER_SETTING, DataType::Int32, false),
    ]))
}
