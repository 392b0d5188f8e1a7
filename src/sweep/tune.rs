//! Source-only sweep for checking the LO by eye on an analyzer display.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::cancel::CancelToken;
use super::error::SweepError;
use super::progress::format_duration;
use crate::device::{DeviceError, SignalSource};
use crate::plan::FrequencyList;

/// Default time spent on each frequency
pub const DEFAULT_DWELL: Duration = Duration::from_millis(200);

/// Steps the source through a frequency list, pass after pass, without
/// measuring anything.
///
/// The LO is returned to the first frequency when the run ends, whether it
/// finished, was cancelled or failed.
#[derive(Debug, Clone)]
pub struct ToneSweep {
    frequencies: FrequencyList,
    power_dbm: i32,
    dwell: Duration,
    passes: Option<usize>,
    cancel: CancelToken,
}

/// What a [`ToneSweep`] run did
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSweepReport {
    /// Passes that reached the last frequency
    pub passes_completed: usize,
    /// Frequency commands the source accepted
    pub steps: usize,
    /// Frequencies the source rejected and that were skipped
    pub rejected: usize,
    /// True when the run stopped on cancellation
    pub interrupted: bool,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl fmt::Display for ToneSweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pass(es), {} steps in {}",
            self.passes_completed,
            self.steps,
            format_duration(self.elapsed)
        )?;
        if self.rejected > 0 {
            write!(f, ", {} rejected", self.rejected)?;
        }
        if self.interrupted {
            write!(f, " (stopped)")?;
        }
        Ok(())
    }
}

impl ToneSweep {
    /// Endless sweep at `power_dbm` with the default dwell
    pub fn new(frequencies: FrequencyList, power_dbm: i32) -> Self {
        Self {
            frequencies,
            power_dbm,
            dwell: DEFAULT_DWELL,
            passes: None,
            cancel: CancelToken::new(),
        }
    }

    /// Time spent on each frequency
    pub fn with_dwell(mut self, dwell: Duration) -> Self {
        self.dwell = dwell;
        self
    }

    /// Stop after `passes` full passes; `None` runs until cancelled
    pub fn with_passes(mut self, passes: Option<usize>) -> Self {
        self.passes = passes;
        self
    }

    /// Token checked before every step
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Time for one pass through the list
    pub fn pass_duration(&self) -> Duration {
        self.dwell * self.frequencies.len() as u32
    }

    /// Drive `source` until the pass count is reached or the token is
    /// cancelled. Rejected frequencies are skipped; a silent or lost source
    /// ends the run.
    pub fn run<S: SignalSource>(&self, source: &mut S) -> Result<ToneSweepReport, SweepError> {
        let started = Instant::now();
        let mut report = ToneSweepReport {
            passes_completed: 0,
            steps: 0,
            rejected: 0,
            interrupted: false,
            elapsed: Duration::ZERO,
        };

        let result = self.sweep(source, &mut report);

        let home = self.frequencies.first();
        info!("Returning LO to {:.3} MHz", home);
        if let Err(e) = source.set_frequency(home) {
            warn!("Could not return LO to {:.3} MHz: {}", home, e);
        }
        if let Err(e) = source.close() {
            warn!("Failed to release source: {}", e);
        }

        report.elapsed = started.elapsed();
        result.map(|()| report)
    }

    fn sweep<S: SignalSource>(
        &self,
        source: &mut S,
        report: &mut ToneSweepReport,
    ) -> Result<(), SweepError> {
        source
            .set_power(self.power_dbm)
            .map_err(|source| SweepError::PowerSetting {
                power_dbm: self.power_dbm,
                source,
            })?;

        while self.passes.map_or(true, |n| report.passes_completed < n) {
            info!(
                "Pass {}: {:.3} - {:.3} MHz, {} steps",
                report.passes_completed + 1,
                self.frequencies.first(),
                self.frequencies.last(),
                self.frequencies.len()
            );
            for (index, &mhz) in self.frequencies.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    info!("Tone sweep stopped at {:.3} MHz", mhz);
                    report.interrupted = true;
                    return Ok(());
                }
                match source.set_frequency(mhz) {
                    Ok(()) => report.steps += 1,
                    Err(e) => self.step_failed(index, mhz, e, report)?,
                }
                if index % 10 == 0 {
                    debug!("{:10.3} MHz", mhz);
                }
                if !self.dwell.is_zero() {
                    thread::sleep(self.dwell);
                }
            }
            report.passes_completed += 1;
        }
        Ok(())
    }

    fn step_failed(
        &self,
        index: usize,
        frequency_mhz: f64,
        error: DeviceError,
        report: &mut ToneSweepReport,
    ) -> Result<(), SweepError> {
        if error.is_connection_loss() {
            return Err(SweepError::DeviceLost {
                device: "source",
                index,
                frequency_mhz,
                operation: "tuning",
                source: error,
            });
        }
        if error.is_timeout() {
            return Err(SweepError::SourceUnresponsive {
                index,
                frequency_mhz,
                source: error,
            });
        }
        warn!("Skipping {:.3} MHz: {}", frequency_mhz, error);
        report.rejected += 1;
        Ok(())
    }
}
