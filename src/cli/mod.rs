use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lo_sweep::device::DeviceError;
use lo_sweep::output::OutputError;
use lo_sweep::plan::PlanError;
use lo_sweep::sweep::SweepError;

mod check;
mod config;
mod ports;
mod scan;
mod stats;
mod sweep;
mod tune;

pub use config::ConfigError;
pub use sweep::SweepArgs;
pub use tune::TuneArgs;

/// lo-sweep - Automated LO power sweeps with an ADF4351 source and a tinySA
#[derive(Parser)]
#[command(name = "lo-sweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the LO across a band and record its output power
    ///
    /// Example:
    ///   lo-sweep sweep --freq-start 900 --freq-stop 960 --freq-step 0.2 --dual-power 5 -10 --parquet
    Sweep(SweepArgs),

    /// Step the source through a band without measuring, for watching the
    /// LO on an analyzer display
    ///
    /// Example:
    ///   lo-sweep tune --start 920 --stop 940 --step 1 --dwell 0.5
    Tune(TuneArgs),

    /// List serial ports and how they were classified
    Ports,

    /// Connectivity self-test of both instruments
    Check {
        /// Source serial port, or "auto"
        #[arg(long, value_name = "PORT")]
        source: Option<String>,

        /// Analyzer serial port, or "auto"
        #[arg(long, value_name = "PORT")]
        analyzer: Option<String>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Quick analyzer scan over a range, reporting the strongest signal
    Scan {
        /// Analyzer serial port, or "auto"
        #[arg(long, value_name = "PORT")]
        analyzer: Option<String>,

        /// Start frequency (MHz)
        #[arg(long, value_name = "MHZ", default_value_t = 900.0)]
        start: f64,

        /// Stop frequency (MHz)
        #[arg(long, value_name = "MHZ", default_value_t = 960.0)]
        stop: f64,

        /// Number of scan points
        #[arg(long, value_name = "N", default_value_t = scan::DEFAULT_POINTS)]
        points: usize,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print statistics of result files (CSV or Parquet)
    Stats {
        /// Result files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sweep(args) => sweep::run(args),
        Commands::Tune(args) => tune::run(args),
        Commands::Ports => ports::run(),
        Commands::Check {
            source,
            analyzer,
            config,
        } => check::run(source, analyzer, config),
        Commands::Scan {
            analyzer,
            start,
            stop,
            points,
            config,
        } => scan::run(analyzer, start, stop, points, config),
        Commands::Stats { files } => stats::run(files),
    }
}

/// Process exit code for a failed command.
///
/// 2: bad settings, 3: an instrument could not be reached, 4: fatal device or
/// output error, 130: interrupted.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() || cause.is::<PlanError>() {
            return 2;
        }
        if let Some(e) = cause.downcast_ref::<SweepError>() {
            return match e {
                SweepError::Connection { .. } => 3,
                SweepError::Interrupted { .. } => 130,
                SweepError::NotConnected => 1,
                _ => 4,
            };
        }
        if let Some(e) = cause.downcast_ref::<DeviceError>() {
            return match e {
                DeviceError::DeviceNotFound { .. } => 3,
                _ => 4,
            };
        }
        if cause.is::<OutputError>() {
            return 4;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dual_power() {
        let cli = Cli::try_parse_from([
            "lo-sweep", "sweep", "--dual-power", "5", "-10", "--parquet",
        ])
        .unwrap();
        match cli.command {
            Commands::Sweep(args) => {
                assert_eq!(args.dual_power, Some(vec![5, -10]));
                assert!(args.parquet);
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_parse_frequency_list() {
        let cli =
            Cli::try_parse_from(["lo-sweep", "sweep", "--frequencies", "900,925.5,960"]).unwrap();
        match cli.command {
            Commands::Sweep(args) => {
                assert_eq!(args.frequencies, Some(vec![900.0, 925.5, 960.0]))
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(Cli::try_parse_from([
            "lo-sweep", "sweep", "--frequencies", "900", "--freq-start", "900",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "lo-sweep", "sweep", "--power", "5", "--dual-power", "5", "-10",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_tune() {
        let cli = Cli::try_parse_from([
            "lo-sweep", "tune", "--power", "-10", "--dwell", "0.5", "--passes", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Tune(args) => {
                assert_eq!(args.power, Some(-10));
                assert_eq!(args.dwell, Some(0.5));
                assert_eq!(args.passes, Some(2));
            }
            _ => panic!("expected tune"),
        }
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::try_parse_from(["lo-sweep", "ports", "-vv"]).unwrap();
        assert_eq!(cli.verbosity(), 2);
    }

    #[test]
    fn test_scan_defaults() {
        let cli = Cli::try_parse_from(["lo-sweep", "scan"]).unwrap();
        match cli.command {
            Commands::Scan { points, start, stop, .. } => {
                assert_eq!(points, 450);
                assert_eq!((start, stop), (900.0, 960.0));
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_exit_codes() {
        let err = anyhow::Error::new(PlanError::NoPowerLevels);
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::new(SweepError::Connection {
            device: "source",
            source: DeviceError::DeviceNotFound {
                device: "source",
                detail: "no port".into(),
            },
        })
        .context("Failed to connect instruments");
        assert_eq!(exit_code(&err), 3);

        let err = anyhow::Error::new(SweepError::Interrupted { index: 4 });
        assert_eq!(exit_code(&err), 130);

        let err = anyhow::Error::new(DeviceError::NotConnected("analyzer"));
        assert_eq!(exit_code(&err), 4);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
