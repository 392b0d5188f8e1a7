//! # Instrument Control
//!
//! Serial clients for the two instruments of a sweep:
//!
//! - [`SourceController`]: Arduino + ADF4351 synthesizer acting as the LO
//! - [`AnalyzerController`]: tinySA Ultra measuring the LO output
//!
//! Both sit on a [`SerialLink`], which adds deadline-bounded line and prompt
//! reads to any [`Port`]. The sweep orchestrator only sees the
//! [`SignalSource`] and [`SpectrumAnalyzer`] traits, so simulated instruments
//! can stand in for hardware.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lo_sweep::device::{AnalyzerConfig, AnalyzerController, PortSpec};
//!
//! let mut analyzer = AnalyzerController::connect(&PortSpec::Auto, AnalyzerConfig::default())?;
//! let peak = analyzer.measure_peak(925.0, 1.0)?;
//! println!("{:.2} dBm at {:.3} MHz", peak.power_dbm, peak.frequency_mhz);
//! # Ok::<(), lo_sweep::device::DeviceError>(())
//! ```

mod analyzer;
mod discovery;
mod error;
mod link;
mod source;

pub use analyzer::{AnalyzerConfig, AnalyzerController, PeakReading, PROMPT};
pub use discovery::{
    analyzer_candidates, list_ports, source_candidates, PortInfo, PortKind, PortSpec,
    TINYSA_VID_PID,
};
pub use error::DeviceError;
pub use link::{open_serial, Port, SerialLink, PORT_READ_TIMEOUT};
pub use source::{SourceConfig, SourceController, SourceStatus};

use crate::plan::AcquisitionSettings;

/// A tunable RF source
pub trait SignalSource {
    /// Tune the output frequency in MHz
    fn set_frequency(&mut self, mhz: f64) -> Result<(), DeviceError>;

    /// Set the output power in dBm
    fn set_power(&mut self, dbm: i32) -> Result<(), DeviceError>;

    /// Last known output state
    fn status(&self) -> SourceStatus;

    /// Release the connection
    fn close(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// An instrument that can report the peak power around a frequency
pub trait SpectrumAnalyzer {
    /// Apply acquisition settings once before a sweep
    fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), DeviceError>;

    /// Peak level within `span_mhz` centred on `center_mhz`
    fn measure_peak(&mut self, center_mhz: f64, span_mhz: f64) -> Result<PeakReading, DeviceError>;

    /// Release the connection
    fn close(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
