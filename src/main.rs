//! # lo-sweep
//!
//! Command-line front end for automated LO power sweeps.
//!
//! ## Usage
//!
//! ```bash
//! # Which ports look like the source and the analyzer?
//! lo-sweep ports
//!
//! # Talk to both instruments once
//! lo-sweep check
//!
//! # Default sweep: 900-960 MHz in 0.2 MHz steps at +5 dBm
//! lo-sweep -v sweep
//!
//! # Two power levels, explicit ports, Parquet alongside CSV
//! lo-sweep sweep --source /dev/ttyUSB0 --analyzer /dev/ttyACM0 --dual-power 5 -10 --parquet
//!
//! # Step the LO alone; watch it on the analyzer, Ctrl-C to stop
//! lo-sweep tune --dwell 0.5
//!
//! # Summarize a result file
//! lo-sweep stats results/lo_power_sweep_20240101_120000_+5dBm.csv
//! ```

use std::process::ExitCode;

use clap::Parser;

mod cli;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());

    match cli::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cli::exit_code(&e))
        }
    }
}
