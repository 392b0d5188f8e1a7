use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};

use lo_sweep::device::{PortSpec, SourceConfig, SourceController};
use lo_sweep::plan::FrequencyList;
use lo_sweep::sweep::{format_duration, CancelToken, ToneSweep, DEFAULT_DWELL};

use super::config::{duration_from_secs, Config, ConfigError};
use super::sweep::{
    port_spec, source_config, DEFAULT_FREQ_START, DEFAULT_FREQ_STEP, DEFAULT_FREQ_STOP,
    DEFAULT_POWER,
};

/// Arguments of the `tune` command
#[derive(Debug, Default, Args)]
pub struct TuneArgs {
    /// Source serial port, or "auto"
    #[arg(long, value_name = "PORT")]
    pub source: Option<String>,

    /// Start frequency (MHz)
    #[arg(long, value_name = "MHZ")]
    pub start: Option<f64>,

    /// Stop frequency (MHz)
    #[arg(long, value_name = "MHZ")]
    pub stop: Option<f64>,

    /// Frequency step (MHz)
    #[arg(long, value_name = "MHZ")]
    pub step: Option<f64>,

    /// LO output power (dBm)
    #[arg(long, value_name = "DBM", allow_negative_numbers = true)]
    pub power: Option<i32>,

    /// Time on each frequency (seconds)
    #[arg(long, value_name = "SECONDS")]
    pub dwell: Option<f64>,

    /// Stop after N passes instead of running until Ctrl-C
    #[arg(long, value_name = "N")]
    pub passes: Option<usize>,

    /// Load settings from a TOML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Tone sweep settings after merging flags, file and defaults
#[derive(Debug)]
pub struct ResolvedTune {
    pub source: PortSpec,
    pub source_config: SourceConfig,
    pub frequencies: FrequencyList,
    pub power_dbm: i32,
    pub dwell: Duration,
    pub passes: Option<usize>,
}

impl TuneArgs {
    /// Flags over the `[sweep]` range of `config` over defaults
    pub fn resolve(&self, config: &Config) -> Result<ResolvedTune, ConfigError> {
        let start = self
            .start
            .or(config.sweep.freq_start)
            .unwrap_or(DEFAULT_FREQ_START);
        let stop = self
            .stop
            .or(config.sweep.freq_stop)
            .unwrap_or(DEFAULT_FREQ_STOP);
        let step = self
            .step
            .or(config.sweep.freq_step)
            .unwrap_or(DEFAULT_FREQ_STEP);
        let dwell = match self.dwell {
            Some(secs) => duration_from_secs("dwell", secs)?,
            None => DEFAULT_DWELL,
        };

        Ok(ResolvedTune {
            source: port_spec(self.source.as_deref().or(config.devices.source.as_deref())),
            source_config: source_config(config)?,
            frequencies: FrequencyList::from_range(start, stop, step)?,
            power_dbm: self
                .power
                .or(config.sweep.power)
                .unwrap_or(DEFAULT_POWER),
            dwell,
            passes: self.passes,
        })
    }
}

/// Step the source through the band for visual checks on an analyzer
pub fn run(args: TuneArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let resolved = args.resolve(&config)?;

    let tone = ToneSweep::new(resolved.frequencies.clone(), resolved.power_dbm)
        .with_dwell(resolved.dwell)
        .with_passes(resolved.passes);
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    let tone = tone.with_cancel(cancel);

    let mut source = SourceController::connect(&resolved.source, resolved.source_config)
        .context("Failed to connect source")?;

    println!(
        "Tone sweep on {}: {:.3} - {:.3} MHz, {} steps at {:+} dBm, {} per pass",
        source.port_name(),
        resolved.frequencies.first(),
        resolved.frequencies.last(),
        resolved.frequencies.len(),
        resolved.power_dbm,
        format_duration(tone.pass_duration())
    );
    if resolved.passes.is_none() {
        println!("Watch the analyzer display; press Ctrl-C to stop");
    }

    let report = tone.run(&mut source).context("Tone sweep failed")?;
    info!("Tone sweep finished");
    println!("{}", report);
    Ok(())
}
