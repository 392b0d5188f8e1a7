/// Errors raised while building a sweep plan.
///
/// Every variant is a configuration error: it is detected before any device I/O.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    /// A numeric parameter was NaN or infinite
    #[error("{name} must be a finite number (got {value})")]
    NotFinite {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Frequency range is empty or reversed
    #[error("Invalid frequency range: start {start} MHz, stop {stop} MHz")]
    InvalidRange {
        /// Start frequency in MHz
        start: f64,
        /// Stop frequency in MHz
        stop: f64,
    },

    /// Step is zero, negative, or finer than the source can resolve
    #[error("Invalid frequency step {step} MHz (minimum {min} MHz)")]
    InvalidStep {
        /// Requested step in MHz
        step: f64,
        /// Smallest accepted step in MHz
        min: f64,
    },

    /// Frequencies must be positive
    #[error("Frequency {0} MHz is not positive")]
    NonPositiveFrequency(f64),

    /// The range would generate more points than a sweep may hold
    #[error("Sweep would contain {count} points (maximum {max})")]
    TooManyPoints {
        /// Requested number of points
        count: usize,
        /// Upper limit
        max: usize,
    },

    /// An explicit frequency list was empty
    #[error("Frequency list is empty")]
    EmptyFrequencyList,

    /// An explicit frequency list was not strictly monotonic
    #[error("Frequency list is not strictly monotonic at index {index} ({value} MHz)")]
    NotMonotonic {
        /// Index of the first out-of-order value
        index: usize,
        /// Offending value in MHz
        value: f64,
    },

    /// No power level was configured
    #[error("At least one LO power level is required")]
    NoPowerLevels,

    /// The same power level appears twice
    #[error("Power level {0:+} dBm is listed more than once")]
    DuplicatePowerLevel(i32),

    /// An acquisition parameter is outside the accepted range
    #[error("Invalid {name}: {reason}")]
    InvalidAcquisition {
        /// Parameter name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
