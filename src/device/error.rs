use std::time::Duration;

/// Errors raised by the serial link and the instrument controllers
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No responsive device answered during discovery
    #[error("No responsive {device} found: {detail}")]
    DeviceNotFound {
        /// Which instrument was being looked for
        device: &'static str,
        /// Ports tried and why they were rejected
        detail: String,
    },

    /// A command was not acknowledged in time
    #[error("{device} did not acknowledge '{command}' within {timeout:?}")]
    CommandTimeout {
        /// Instrument name
        device: &'static str,
        /// Command that was sent
        command: String,
        /// How long we waited
        timeout: Duration,
    },

    /// The device answered with an error
    #[error("{device} rejected '{command}': {reply}")]
    CommandRejected {
        /// Instrument name
        device: &'static str,
        /// Command that was sent
        command: String,
        /// Raw reply text
        reply: String,
    },

    /// The analyzer did not finish an acquisition in time
    #[error("Analyzer did not return a measurement at {center_mhz:.3} MHz within {timeout:?}")]
    MeasurementTimeout {
        /// Requested center frequency
        center_mhz: f64,
        /// How long we waited
        timeout: Duration,
    },

    /// The analyzer returned no usable data
    #[error("Measurement at {center_mhz:.3} MHz failed: {reason}")]
    MeasurementFailed {
        /// Requested center frequency
        center_mhz: f64,
        /// Why the reply was unusable
        reason: String,
    },

    /// A reply could not be parsed
    #[error("Malformed reply from {device}: {detail}")]
    Protocol {
        /// Instrument name
        device: &'static str,
        /// Parse failure description
        detail: String,
    },

    /// Operation on a closed connection
    #[error("Not connected to {0}")]
    NotConnected(&'static str),

    /// I/O error on the serial link
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error opening or configuring a serial port
    #[error("Serial port error: {0}")]
    SerialPortError(#[from] serialport::Error),
}

impl DeviceError {
    /// True when the link itself is gone and retrying cannot help
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            DeviceError::IoError(_) | DeviceError::SerialPortError(_) | DeviceError::NotConnected(_)
        )
    }

    /// True for errors caused by a silent device
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DeviceError::CommandTimeout { .. } | DeviceError::MeasurementTimeout { .. }
        )
    }
}
