use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};

use lo_sweep::device::{
    AnalyzerConfig, AnalyzerController, PortSpec, SourceConfig, SourceController,
};
use lo_sweep::output::{CompressionType, OutputLayout, TableConfig, DEFAULT_OUTPUT_DIR};
use lo_sweep::plan::{
    AcquisitionSettings, Attenuation, Averaging, FrequencyList, Rbw, SweepPlan,
};
use lo_sweep::sweep::{CancelToken, RetryPolicy, SweepOrchestrator};

use super::config::{duration_from_secs, Config, ConfigError};

pub(super) const DEFAULT_FREQ_START: f64 = 900.0;
pub(super) const DEFAULT_FREQ_STOP: f64 = 960.0;
pub(super) const DEFAULT_FREQ_STEP: f64 = 0.2;
pub(super) const DEFAULT_POWER: i32 = 5;
const DEFAULT_SETTLING_S: f64 = 0.1;

/// Arguments of the `sweep` command
#[derive(Debug, Default, Args)]
pub struct SweepArgs {
    /// Source serial port, or "auto"
    #[arg(long, value_name = "PORT")]
    pub source: Option<String>,

    /// Analyzer serial port, or "auto"
    #[arg(long, value_name = "PORT")]
    pub analyzer: Option<String>,

    /// Start frequency (MHz)
    #[arg(long, value_name = "MHZ")]
    pub freq_start: Option<f64>,

    /// Stop frequency (MHz)
    #[arg(long, value_name = "MHZ")]
    pub freq_stop: Option<f64>,

    /// Frequency step (MHz)
    #[arg(long, value_name = "MHZ")]
    pub freq_step: Option<f64>,

    /// Explicit comma-separated frequency list (MHz)
    #[arg(
        long,
        value_name = "MHZ,...",
        value_delimiter = ',',
        conflicts_with_all = ["freq_start", "freq_stop", "freq_step"]
    )]
    pub frequencies: Option<Vec<f64>>,

    /// LO output power (dBm)
    #[arg(long, value_name = "DBM", allow_negative_numbers = true)]
    pub power: Option<i32>,

    /// Run two sweeps at these LO power levels (dBm)
    #[arg(
        long,
        num_args = 2,
        value_names = ["P1", "P2"],
        allow_negative_numbers = true,
        conflicts_with = "power"
    )]
    pub dual_power: Option<Vec<i32>>,

    /// Wait after retuning before measuring (seconds)
    #[arg(long, value_name = "SECONDS")]
    pub settling_time: Option<f64>,

    /// Measurement span around each frequency (MHz)
    #[arg(long, value_name = "MHZ")]
    pub span: Option<f64>,

    /// Resolution bandwidth in kHz, or "auto"
    #[arg(long, value_name = "KHZ|auto")]
    pub rbw: Option<String>,

    /// Trace averaging (1, 4 or 16)
    #[arg(long, value_name = "N")]
    pub averaging: Option<u32>,

    /// Input attenuation in dB (0-31), or "auto"
    #[arg(long, value_name = "DB|auto")]
    pub attenuation: Option<String>,

    /// Points per measurement window
    #[arg(long, value_name = "N")]
    pub points: Option<usize>,

    /// Extra attempts for a failed point
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Output CSV file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for generated output file names
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write a Parquet table next to each CSV file (implied by a
    /// `.parquet` output path)
    #[arg(long)]
    pub parquet: bool,

    /// Parquet compression (zstd, zstd:<level>, snappy, none)
    #[arg(long, value_name = "CODEC")]
    pub compression: Option<String>,

    /// Save results every N points instead of only at the end
    #[arg(long, value_name = "N")]
    pub flush_every: Option<usize>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Everything a sweep run needs, after merging flags, file and defaults
#[derive(Debug)]
pub struct ResolvedSweep {
    pub source: PortSpec,
    pub analyzer: PortSpec,
    pub source_config: SourceConfig,
    pub analyzer_config: AnalyzerConfig,
    pub plan: SweepPlan,
    pub retry: RetryPolicy,
    pub layout: OutputLayout,
    pub parquet: Option<TableConfig>,
    pub flush_every: Option<usize>,
}

impl SweepArgs {
    /// Merge flags over `config` over defaults and validate the result
    pub fn resolve(&self, config: &Config) -> Result<ResolvedSweep, ConfigError> {
        let plan = SweepPlan::new(
            self.frequency_list(config)?,
            self.power_levels(config),
            duration_from_secs(
                "settling_time",
                self.settling_time
                    .or(config.sweep.settling_time)
                    .unwrap_or(DEFAULT_SETTLING_S),
            )?,
            self.acquisition(config)?,
        )?;

        let output = self.output.clone().or_else(|| config.output.output.clone());
        let output_dir = self
            .output_dir
            .clone()
            .or_else(|| config.output.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let mut layout = OutputLayout::new(output, output_dir);
        if let Some(format) = &config.output.timestamp_format {
            layout = layout.with_timestamp_format(format)?;
        }

        let compression = match &self.compression {
            Some(codec) => Some(codec.parse::<CompressionType>()?),
            None => config.compression()?,
        };
        let parquet = (self.parquet
            || config.output.parquet.unwrap_or(false)
            || layout.wants_parquet())
        .then(|| {
            TableConfig {
                compression: compression.unwrap_or_default(),
                ..TableConfig::default()
            }
        });

        Ok(ResolvedSweep {
            source: port_spec(self.source.as_deref().or(config.devices.source.as_deref())),
            analyzer: port_spec(
                self.analyzer
                    .as_deref()
                    .or(config.devices.analyzer.as_deref()),
            ),
            source_config: source_config(config)?,
            analyzer_config: analyzer_config(config)?,
            plan,
            retry: RetryPolicy::new(self.retries.or(config.sweep.retries).unwrap_or(1)),
            layout,
            parquet,
            flush_every: self.flush_every.or(config.output.flush_every),
        })
    }

    /// Command-line list, else command-line range, else file list, else file
    /// range; missing range ends fall back to the defaults.
    fn frequency_list(&self, config: &Config) -> Result<FrequencyList, ConfigError> {
        if let Some(values) = &self.frequencies {
            return Ok(FrequencyList::from_values(values.clone())?);
        }
        let cli_range =
            self.freq_start.is_some() || self.freq_stop.is_some() || self.freq_step.is_some();
        if !cli_range {
            if let Some(values) = &config.sweep.frequencies {
                return Ok(FrequencyList::from_values(values.clone())?);
            }
        }
        let start = self
            .freq_start
            .or(config.sweep.freq_start)
            .unwrap_or(DEFAULT_FREQ_START);
        let stop = self
            .freq_stop
            .or(config.sweep.freq_stop)
            .unwrap_or(DEFAULT_FREQ_STOP);
        let step = self
            .freq_step
            .or(config.sweep.freq_step)
            .unwrap_or(DEFAULT_FREQ_STEP);
        Ok(FrequencyList::from_range(start, stop, step)?)
    }

    fn power_levels(&self, config: &Config) -> Vec<i32> {
        if let Some(levels) = &self.dual_power {
            return levels.clone();
        }
        if let Some(power) = self.power {
            return vec![power];
        }
        if let Some(levels) = &config.sweep.power_levels {
            return levels.clone();
        }
        vec![config.sweep.power.unwrap_or(DEFAULT_POWER)]
    }

    fn acquisition(&self, config: &Config) -> Result<AcquisitionSettings, ConfigError> {
        let defaults = AcquisitionSettings::default();
        let file = &config.analyzer;

        let rbw = match (&self.rbw, &file.rbw) {
            (Some(text), _) => text.parse::<Rbw>()?,
            (None, Some(value)) => value.to_string().parse::<Rbw>()?,
            (None, None) => defaults.rbw,
        };
        let attenuation = match (&self.attenuation, &file.attenuation) {
            (Some(text), _) => text.parse::<Attenuation>()?,
            (None, Some(value)) => value.to_string().parse::<Attenuation>()?,
            (None, None) => defaults.attenuation,
        };
        let averaging = match self.averaging.or(file.averaging) {
            Some(count) => Averaging::try_from(count)?,
            None => defaults.averaging,
        };

        Ok(AcquisitionSettings {
            span_mhz: self.span.or(file.span).unwrap_or(defaults.span_mhz),
            rbw,
            averaging,
            attenuation,
            points: self.points.or(file.points).unwrap_or(defaults.points),
        })
    }
}

/// Port spec from an optional flag/file value; absent means auto
pub fn port_spec(value: Option<&str>) -> PortSpec {
    match value {
        Some(text) => match text.parse() {
            Ok(spec) => spec,
            Err(never) => match never {},
        },
        None => PortSpec::Auto,
    }
}

/// Source link settings from `[devices]`
pub fn source_config(config: &Config) -> Result<SourceConfig, ConfigError> {
    let mut source = SourceConfig::default();
    if let Some(baud) = config.devices.source_baud {
        source.baud_rate = baud;
    }
    if let Some(secs) = config.devices.reply_timeout {
        source.reply_timeout = duration_from_secs("reply_timeout", secs)?;
    }
    if let Some(secs) = config.devices.reset_delay {
        source.reset_delay = duration_from_secs("reset_delay", secs)?;
    }
    Ok(source)
}

/// Analyzer link settings from `[devices]`
pub fn analyzer_config(config: &Config) -> Result<AnalyzerConfig, ConfigError> {
    let mut analyzer = AnalyzerConfig::default();
    if let Some(secs) = config.devices.measurement_timeout {
        analyzer.measurement_timeout = duration_from_secs("measurement_timeout", secs)?;
    }
    Ok(analyzer)
}

/// Run a complete sweep
pub fn run(args: SweepArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let resolved = args.resolve(&config)?;

    let plan = &resolved.plan;
    info!(
        "Sweep: {} points from {:.3} to {:.3} MHz, LO power {:?} dBm, settling {:?}",
        plan.frequencies().len(),
        plan.frequencies().first(),
        plan.frequencies().last(),
        plan.power_levels(),
        plan.settling_time()
    );

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Interrupt received, stopping after the current point...");
        handler_token.cancel();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let mut sweep = SweepOrchestrator::new(resolved.plan, resolved.layout)
        .with_retry(resolved.retry)
        .with_cancel(cancel);
    if let Some(table) = resolved.parquet {
        sweep = sweep.with_parquet(table);
    }
    if let Some(n) = resolved.flush_every {
        sweep = sweep.with_flush_every(n);
    }

    let (source, source_config) = (resolved.source, resolved.source_config);
    let (analyzer, analyzer_config) = (resolved.analyzer, resolved.analyzer_config);
    sweep
        .connect(
            || SourceController::connect(&source, source_config),
            || AnalyzerController::connect(&analyzer, analyzer_config),
        )
        .context("Failed to connect instruments")?;

    let outcome = sweep.run().cloned();
    let report = sweep.report();
    for pass in &report.passes {
        println!("{}", pass);
        if pass.statistics.valid > 0 {
            println!("{}", indent(&pass.statistics.to_string()));
        }
    }

    let report = outcome.context("Sweep aborted")?;
    if report.missing() > 0 {
        warn!("{} point(s) could not be measured", report.missing());
    }
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
