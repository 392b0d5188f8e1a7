use std::thread;

use log::{debug, error, info, warn};
use uuid::Uuid;

use super::cancel::CancelToken;
use super::error::SweepError;
use super::progress::Progress;
use super::report::{PassSummary, PointFailure, SweepReport};
use super::retry::RetryPolicy;
use super::state::SweepState;
use crate::device::{DeviceError, SignalSource, SpectrumAnalyzer};
use crate::output::{OutputLayout, ResultWriter, SweepStatistics, TableConfig, TableMetadata};
use crate::plan::SweepPlan;
use crate::record::{MeasurementRecord, PointOutcome};

/// Result of tuning the source to one point
enum Tuning {
    Tuned,
    Rejected(String),
}

/// Drives a source and an analyzer through a [`SweepPlan`].
///
/// ```text
/// Idle -> Connecting -> Sweeping -> Complete
///                   \           \-> Failed
///                    \-> Failed
/// ```
///
/// Each power level is one pass over all frequencies and one output table.
/// Instruments are closed when the run ends, fails, or the orchestrator is
/// dropped.
pub struct SweepOrchestrator<S: SignalSource, A: SpectrumAnalyzer> {
    plan: SweepPlan,
    layout: OutputLayout,
    parquet: Option<TableConfig>,
    flush_every: Option<usize>,
    retry: RetryPolicy,
    cancel: CancelToken,
    source: Option<S>,
    analyzer: Option<A>,
    state: SweepState,
    report: SweepReport,
}

impl<S: SignalSource, A: SpectrumAnalyzer> SweepOrchestrator<S, A> {
    /// Orchestrator for `plan`, writing CSV tables named by `layout`
    pub fn new(plan: SweepPlan, layout: OutputLayout) -> Self {
        Self {
            plan,
            layout,
            parquet: None,
            flush_every: None,
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
            source: None,
            analyzer: None,
            state: SweepState::Idle,
            report: SweepReport {
                run_id: Uuid::new_v4(),
                passes: Vec::new(),
            },
        }
    }

    /// Also write a Parquet table per power level
    pub fn with_parquet(mut self, config: TableConfig) -> Self {
        self.parquet = Some(config);
        self
    }

    /// Persist results every `n` points instead of only at the end of a pass
    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = (n > 0).then_some(n);
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share a cancellation token, e.g. with an interrupt handler
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Plan being executed
    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    /// Report of the passes run so far
    pub fn report(&self) -> &SweepReport {
        &self.report
    }

    /// Open both instruments and configure the analyzer.
    ///
    /// The source is opened first. On any failure everything opened so far
    /// is closed again and the state becomes `Failed`.
    pub fn connect<FS, FA>(&mut self, open_source: FS, open_analyzer: FA) -> Result<(), SweepError>
    where
        FS: FnOnce() -> Result<S, DeviceError>,
        FA: FnOnce() -> Result<A, DeviceError>,
    {
        self.state = SweepState::Connecting;
        info!("Connecting to instruments");

        let result = self.open_instruments(open_source, open_analyzer);
        if let Err(e) = &result {
            error!("{}", e);
            self.shutdown();
            self.state = SweepState::Failed;
        }
        result
    }

    fn open_instruments<FS, FA>(&mut self, open_source: FS, open_analyzer: FA) -> Result<(), SweepError>
    where
        FS: FnOnce() -> Result<S, DeviceError>,
        FA: FnOnce() -> Result<A, DeviceError>,
    {
        let source = open_source().map_err(|e| SweepError::Connection {
            device: "source",
            source: e,
        })?;
        self.source = Some(source);

        let analyzer = open_analyzer().map_err(|e| SweepError::Connection {
            device: "analyzer",
            source: e,
        })?;
        let analyzer = self.analyzer.insert(analyzer);
        analyzer
            .configure(self.plan.acquisition())
            .map_err(SweepError::Configure)?;
        Ok(())
    }

    /// Run every power level in order.
    ///
    /// Each pass is flushed when it ends, including when it ends in failure.
    /// Instruments are closed before returning.
    pub fn run(&mut self) -> Result<&SweepReport, SweepError> {
        if self.state != SweepState::Connecting || self.source.is_none() || self.analyzer.is_none()
        {
            return Err(SweepError::NotConnected);
        }

        let levels = self.plan.power_levels().to_vec();
        for (pass, &lo_power) in levels.iter().enumerate() {
            self.state = SweepState::Sweeping;
            info!(
                "Starting sweep {}/{} at LO power {:+} dBm ({} points)",
                pass + 1,
                levels.len(),
                lo_power,
                self.plan.frequencies().len()
            );

            let (summary, result) = self.run_pass(lo_power);
            info!("{}", summary);
            self.report.passes.push(summary);

            if let Err(e) = result {
                error!("{}", e);
                self.state = SweepState::Failed;
                self.shutdown();
                return Err(e);
            }
        }

        self.state = SweepState::Complete;
        self.shutdown();
        Ok(&self.report)
    }

    /// Close both instruments. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut analyzer) = self.analyzer.take() {
            if let Err(e) = analyzer.close() {
                warn!("Error closing analyzer: {}", e);
            }
        }
        if let Some(mut source) = self.source.take() {
            if let Err(e) = source.close() {
                warn!("Error closing source: {}", e);
            }
        }
    }

    fn result_writer(&self, lo_power: i32) -> Result<ResultWriter, SweepError> {
        let csv_path = self.layout.csv_path(lo_power, self.plan.is_multi_power());
        let mut writer = ResultWriter::new(csv_path);
        if let Some(config) = &self.parquet {
            let plan_json = self.plan.to_json().map_err(crate::output::OutputError::from)?;
            let metadata =
                TableMetadata::new(self.report.run_id, lo_power).with_sweep_plan(plan_json);
            writer = writer.with_parquet(config.clone(), metadata);
        }
        if let Some(n) = self.flush_every {
            writer = writer.with_flush_every(n);
        }
        Ok(writer)
    }

    fn run_pass(&mut self, lo_power: i32) -> (PassSummary, Result<(), SweepError>) {
        let planned = self.plan.frequencies().len();
        let progress = Progress::start(planned, lo_power);
        let mut failures = Vec::new();

        let mut writer = match self.result_writer(lo_power) {
            Ok(writer) => writer,
            Err(e) => {
                let summary = PassSummary {
                    lo_power,
                    planned,
                    recorded: 0,
                    failures,
                    csv_path: self.layout.csv_path(lo_power, self.plan.is_multi_power()),
                    parquet_path: None,
                    elapsed: progress.elapsed(),
                    completed: false,
                    statistics: SweepStatistics::default(),
                };
                return (summary, Err(e));
            }
        };

        let swept = self.sweep_points(lo_power, &mut writer, &mut failures, &progress);
        let statistics = writer.statistics();
        let recorded = writer.len();
        let csv_path = writer.csv_path().to_path_buf();
        let parquet_path = writer.parquet_path().map(|p| p.to_path_buf());

        let result = match (swept, writer.finish()) {
            (Ok(()), Ok(_)) => Ok(()),
            (Ok(()), Err(e)) => Err(SweepError::Output(e)),
            (Err(e), Ok(stats)) => {
                info!("Partial results saved: {}", stats);
                Err(e)
            }
            (Err(e), Err(flush_err)) => {
                error!("Could not save partial results: {}", flush_err);
                Err(e)
            }
        };

        let summary = PassSummary {
            lo_power,
            planned,
            recorded,
            failures,
            csv_path,
            parquet_path,
            elapsed: progress.elapsed(),
            completed: result.is_ok() && recorded == planned,
            statistics,
        };
        (summary, result)
    }

    fn sweep_points(
        &mut self,
        lo_power: i32,
        writer: &mut ResultWriter,
        failures: &mut Vec<PointFailure>,
        progress: &Progress,
    ) -> Result<(), SweepError> {
        self.set_power(lo_power)?;

        let frequencies = self.plan.frequencies().clone();
        let settling = self.plan.settling_time();
        for (index, &frequency_mhz) in frequencies.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Sweep cancelled before point {} ({:.3} MHz)", index, frequency_mhz);
                return Err(SweepError::Interrupted { index });
            }

            let outcome = match self.tune(index, frequency_mhz)? {
                Tuning::Tuned => {
                    if !settling.is_zero() {
                        thread::sleep(settling);
                    }
                    self.measure(index, frequency_mhz)?
                }
                Tuning::Rejected(reason) => PointOutcome::Missing { reason },
            };

            if let PointOutcome::Missing { reason } = &outcome {
                failures.push(PointFailure {
                    index,
                    frequency_mhz,
                    reason: reason.clone(),
                });
            }
            progress.point(index, frequency_mhz, &outcome);
            writer.append(MeasurementRecord::from_outcome(
                frequency_mhz,
                &outcome,
                lo_power,
            ))?;
        }
        Ok(())
    }

    fn set_power(&mut self, lo_power: i32) -> Result<(), SweepError> {
        let attempts = self.retry.attempts();
        let source = self.source.as_mut().ok_or(SweepError::NotConnected)?;

        let mut attempt = 1;
        loop {
            match source.set_power(lo_power) {
                Ok(()) => {
                    debug!("LO power set to {:+} dBm", lo_power);
                    return Ok(());
                }
                Err(e) if e.is_connection_loss() || attempt >= attempts => {
                    return Err(SweepError::PowerSetting {
                        power_dbm: lo_power,
                        source: e,
                    })
                }
                Err(e) => {
                    warn!(
                        "set_power {:+} dBm failed (attempt {}/{}): {}",
                        lo_power, attempt, attempts, e
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Set the source frequency for point `index`.
    ///
    /// Connection loss is fatal, as is a timeout on every attempt. Any other
    /// persistent failure makes the point missing.
    fn tune(&mut self, index: usize, frequency_mhz: f64) -> Result<Tuning, SweepError> {
        let attempts = self.retry.attempts();
        let source = self.source.as_mut().ok_or(SweepError::NotConnected)?;

        let mut all_timeouts = true;
        let mut attempt = 1;
        loop {
            let e = match source.set_frequency(frequency_mhz) {
                Ok(()) => return Ok(Tuning::Tuned),
                Err(e) => e,
            };
            if e.is_connection_loss() {
                return Err(SweepError::DeviceLost {
                    device: "source",
                    index,
                    frequency_mhz,
                    operation: "set_frequency",
                    source: e,
                });
            }
            all_timeouts &= e.is_timeout();
            warn!(
                "Point {} ({:.3} MHz): set_frequency failed (attempt {}/{}): {}",
                index, frequency_mhz, attempt, attempts, e
            );

            if attempt >= attempts {
                if all_timeouts {
                    return Err(SweepError::SourceUnresponsive {
                        index,
                        frequency_mhz,
                        source: e,
                    });
                }
                return Ok(Tuning::Rejected(e.to_string()));
            }
            attempt += 1;
        }
    }

    /// Measure point `index`, retrying recoverable failures.
    ///
    /// Connection loss is fatal; exhausted retries make the point missing.
    fn measure(&mut self, index: usize, frequency_mhz: f64) -> Result<PointOutcome, SweepError> {
        let attempts = self.retry.attempts();
        let span = self.plan.acquisition().span_mhz;
        let analyzer = self.analyzer.as_mut().ok_or(SweepError::NotConnected)?;

        let mut attempt = 1;
        loop {
            let e = match analyzer.measure_peak(frequency_mhz, span) {
                Ok(reading) => return Ok(PointOutcome::Measured(reading)),
                Err(e) => e,
            };
            if e.is_connection_loss() {
                return Err(SweepError::DeviceLost {
                    device: "analyzer",
                    index,
                    frequency_mhz,
                    operation: "measure_peak",
                    source: e,
                });
            }
            warn!(
                "Point {} ({:.3} MHz): measure_peak failed (attempt {}/{}): {}",
                index, frequency_mhz, attempt, attempts, e
            );
            if attempt >= attempts {
                return Ok(PointOutcome::Missing {
                    reason: e.to_string(),
                });
            }
            attempt += 1;
        }
    }
}

impl<S: SignalSource, A: SpectrumAnalyzer> Drop for SweepOrchestrator<S, A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
