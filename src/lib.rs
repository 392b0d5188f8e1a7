//! # lo-sweep - Automated LO Power Sweeps
//!
//! `lo_sweep` measures the output power of a frequency-agile local oscillator
//! across a band. It steps an Arduino-driven ADF4351 synthesizer through a list
//! of frequencies, lets each setting settle, reads the peak level from a tinySA
//! Ultra spectrum analyzer and writes one table row per point.
//!
//! ## Key Features
//!
//! - **Validated plans**: frequency ranges and explicit lists are checked before
//!   any instrument is touched.
//!
//! - **Partial-failure semantics**: a point the analyzer cannot measure is
//!   retried, then kept as an empty reading. One bad point never aborts a
//!   sweep, and a fatal error still leaves every collected row on disk.
//!
//! - **Dual-power sweeps**: several LO power levels run back to back over the
//!   same connections, one table per level.
//!
//! - **Self-describing output**: CSV for spreadsheets, plus an optional Parquet
//!   table whose footer records the run id and the full sweep plan.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use lo_sweep::prelude::*;
//!
//! let plan = SweepPlan::new(
//!     FrequencyList::from_range(900.0, 960.0, 0.2)?,
//!     vec![5],
//!     Duration::from_millis(100),
//!     AcquisitionSettings::default(),
//! )?;
//!
//! let mut sweep = SweepOrchestrator::new(plan, OutputLayout::default());
//! sweep.connect(
//!     || SourceController::connect(&PortSpec::Auto, SourceConfig::default()),
//!     || AnalyzerController::connect(&PortSpec::Auto, AnalyzerConfig::default()),
//! )?;
//! let report = sweep.run()?;
//! println!("{}", report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Output Format
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | frequency_mhz | Float64 | Commanded LO frequency |
//! | power_dbm | Float64, nullable | Peak level, empty when the point failed |
//! | timestamp | Timestamp(µs) | Local time of the measurement |
//! | lo_power_setting | Int32 | LO output power of the sweep |
//!
//! ## Architecture
//!
//! - [`plan`]: sweep plan, frequency lists and acquisition settings
//! - [`device`]: serial link, port discovery and the two instrument controllers
//! - [`record`]: per-point outcomes and table rows
//! - [`output`]: CSV/Parquet writers and readers, statistics, file naming
//! - [`sweep`]: the measurement state machine and the source-only tone sweep

#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod device;
pub mod output;
pub mod plan;
pub mod record;
pub mod sweep;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::device::{
        AnalyzerConfig, AnalyzerController, DeviceError, PeakReading, PortSpec, SignalSource,
        SourceConfig, SourceController, SourceStatus, SpectrumAnalyzer,
    };
    pub use crate::output::{
        read_csv, read_parquet, read_table, write_csv, CompressionType, OutputError,
        OutputLayout, ResultWriter, SweepStatistics, TableConfig, TableMetadata,
    };
    pub use crate::plan::{
        AcquisitionSettings, Attenuation, Averaging, FrequencyList, PlanError, Rbw, SweepPlan,
    };
    pub use crate::record::{MeasurementRecord, PointOutcome};
    pub use crate::sweep::{
        CancelToken, RetryPolicy, SweepError, SweepOrchestrator, SweepReport, SweepState,
        ToneSweep,
    };
}
