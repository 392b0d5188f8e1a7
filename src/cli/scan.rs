use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use lo_sweep::device::AnalyzerController;
use lo_sweep::plan::MAX_ACQUISITION_POINTS;

use super::config::{Config, ConfigError};
use super::sweep::{analyzer_config, port_spec};

/// Scan points when `--points` is not given
pub const DEFAULT_POINTS: usize = 450;

/// Strongest few readings printed after the peak
const TOP_READINGS: usize = 5;

/// Range and point count the analyzer can scan in one go
fn validate(start: f64, stop: f64, points: usize) -> Result<(), ConfigError> {
    if !(start.is_finite() && stop.is_finite()) || start <= 0.0 || stop <= start {
        return Err(ConfigError::invalid(
            "scan range",
            format!("{} - {} MHz", start, stop),
        ));
    }
    if !(2..=MAX_ACQUISITION_POINTS).contains(&points) {
        return Err(ConfigError::invalid(
            "points",
            format!("expected 2..={}, got {}", MAX_ACQUISITION_POINTS, points),
        ));
    }
    Ok(())
}

/// Scan a range once and report the strongest signal
pub fn run(
    analyzer: Option<String>,
    start: f64,
    stop: f64,
    points: usize,
    config: Option<PathBuf>,
) -> Result<()> {
    validate(start, stop, points)?;

    let config = Config::load(config.as_deref())?;
    let spec = port_spec(analyzer.as_deref().or(config.devices.analyzer.as_deref()));
    let mut analyzer = AnalyzerController::connect(&spec, analyzer_config(&config)?)
        .context("Failed to connect analyzer")?;

    info!(
        "Scanning {:.3} - {:.3} MHz with {} points on {}",
        start,
        stop,
        points,
        analyzer.port_name()
    );
    let scanned = analyzer.quick_scan(start, stop, points);
    let closed = analyzer.close();
    let mut readings = scanned.context("Scan failed")?;
    closed.context("Failed to release analyzer")?;

    readings.sort_by(|a, b| b.1.total_cmp(&a.1));
    println!("Scan {:.3} - {:.3} MHz ({} points)", start, stop, readings.len());
    if let Some((mhz, dbm)) = readings.first() {
        println!("Peak: {:.2} dBm at {:.3} MHz", dbm, mhz);
    }
    for (mhz, dbm) in readings.iter().skip(1).take(TOP_READINGS - 1) {
        println!("      {:.2} dBm at {:.3} MHz", dbm, mhz);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate(900.0, 960.0, DEFAULT_POINTS).is_ok());
        assert!(validate(900.0, 960.0, 2).is_ok());
        assert!(validate(900.0, 960.0, 1).is_err());
        assert!(validate(900.0, 960.0, MAX_ACQUISITION_POINTS + 1).is_err());
        assert!(validate(960.0, 900.0, 100).is_err());
        assert!(validate(f64::NAN, 960.0, 100).is_err());
    }

    #[test]
    fn test_too_many_points_is_a_settings_error() {
        let err = anyhow::Error::new(validate(900.0, 960.0, 10_000).unwrap_err());
        assert_eq!(crate::cli::exit_code(&err), 2);
    }
}
