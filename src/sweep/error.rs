use crate::device::DeviceError;
use crate::output::OutputError;

/// Errors that end a sweep run
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    /// An instrument could not be opened
    #[error("Could not connect to the {device}: {source}")]
    Connection {
        /// Which instrument
        device: &'static str,
        /// Underlying failure
        source: DeviceError,
    },

    /// The analyzer refused the acquisition settings
    #[error("Analyzer rejected the acquisition settings: {0}")]
    Configure(#[source] DeviceError),

    /// The LO power could not be set
    #[error("Could not set LO power to {power_dbm:+} dBm: {source}")]
    PowerSetting {
        /// Requested power
        power_dbm: i32,
        /// Underlying failure
        source: DeviceError,
    },

    /// The serial link to an instrument broke mid-sweep
    #[error("Lost the {device} at point {index} ({frequency_mhz:.3} MHz) during {operation}: {source}")]
    DeviceLost {
        /// Which instrument
        device: &'static str,
        /// Point index within the sweep
        index: usize,
        /// Point frequency
        frequency_mhz: f64,
        /// Operation in progress
        operation: &'static str,
        /// Underlying failure
        source: DeviceError,
    },

    /// The source stopped acknowledging commands
    #[error("Source unresponsive at point {index} ({frequency_mhz:.3} MHz): {source}")]
    SourceUnresponsive {
        /// Point index within the sweep
        index: usize,
        /// Point frequency
        frequency_mhz: f64,
        /// Last timeout
        source: DeviceError,
    },

    /// Cancelled by the operator
    #[error("Sweep interrupted before point {index}")]
    Interrupted {
        /// First point not measured
        index: usize,
    },

    /// Results could not be written
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// `run` was called without connected instruments
    #[error("Instruments are not connected")]
    NotConnected,
}
