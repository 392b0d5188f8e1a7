//! Controller for the tinySA Ultra spectrum analyzer.
//!
//! The tinySA exposes a text shell over its USB virtual COM port. Commands
//! end with `\r`; the device echoes the command, prints its output and
//! finishes with the prompt `ch> `.
//!
//! Peak measurements use `hop`, which acquires a fixed number of points over a
//! narrow window while the continuous sweep is paused, so every reading comes
//! from a fresh acquisition at the requested frequency.

use std::time::Duration;

use log::{debug, info, warn};
use serialport::SerialPort;

use super::discovery::{analyzer_candidates, list_ports, PortSpec, TINYSA_VID_PID};
use super::error::DeviceError;
use super::link::{open_serial, Port, SerialLink};
use super::SpectrumAnalyzer;
use crate::plan::{AcquisitionSettings, Attenuation, Averaging, Rbw};

const DEVICE: &str = "analyzer";

/// Shell prompt that terminates every reply
pub const PROMPT: &[u8] = b"ch> ";

/// Commands that put the tinySA into low-band spectrum analyzer mode
const MODE_COMMANDS: &[&str] = &["mode low input", "agc auto", "attenuate auto", "rbw auto"];

/// `hop`/`scan` output mask: frequency and level columns
const OUTMASK_FREQ_LEVEL: u8 = 3;

/// Connection and timing parameters for the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Serial baud rate (ignored by the USB CDC device but required to open)
    pub baud_rate: u32,
    /// Maximum wait for the prompt after an ordinary command
    pub command_timeout: Duration,
    /// Maximum wait for a hop or scan acquisition
    pub measurement_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            command_timeout: Duration::from_secs(2),
            measurement_timeout: Duration::from_secs(10),
        }
    }
}

/// Strongest signal found in a measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakReading {
    /// Peak level in dBm
    pub power_dbm: f64,
    /// Frequency of the peak in MHz
    pub frequency_mhz: f64,
}

/// Serial client for the tinySA
pub struct AnalyzerController<P: Port = Box<dyn SerialPort>> {
    link: Option<SerialLink<P>>,
    config: AnalyzerConfig,
    identity: Vec<String>,
    points: usize,
}

impl AnalyzerController<Box<dyn SerialPort>> {
    /// Open the analyzer on a fixed port, or on the first responsive port
    /// with the tinySA USB ids when `spec` is [`PortSpec::Auto`].
    pub fn connect(spec: &PortSpec, config: AnalyzerConfig) -> Result<Self, DeviceError> {
        match spec {
            PortSpec::Path(path) => Self::open(path, config),
            PortSpec::Auto => {
                let candidates = analyzer_candidates(&list_ports()?);
                if candidates.is_empty() {
                    return Err(DeviceError::DeviceNotFound {
                        device: DEVICE,
                        detail: format!(
                            "no port with USB id {:04x}:{:04x}",
                            TINYSA_VID_PID.0, TINYSA_VID_PID.1
                        ),
                    });
                }

                let mut rejected = Vec::with_capacity(candidates.len());
                for name in candidates {
                    info!("Probing {} for the analyzer", name);
                    match Self::open(&name, config.clone()) {
                        Ok(controller) => return Ok(controller),
                        Err(e) => {
                            debug!("{} rejected: {}", name, e);
                            rejected.push(format!("{} ({})", name, e));
                        }
                    }
                }
                Err(DeviceError::DeviceNotFound {
                    device: DEVICE,
                    detail: format!("tried {}", rejected.join(", ")),
                })
            }
        }
    }

    fn open(path: &str, config: AnalyzerConfig) -> Result<Self, DeviceError> {
        let port = open_serial(path, config.baud_rate)?;
        Self::with_port(port, path, config)
    }
}

impl<P: Port> AnalyzerController<P> {
    /// Take over an already open port: identify the device and switch it to
    /// spectrum analyzer mode.
    pub fn with_port(
        port: P,
        name: impl Into<String>,
        config: AnalyzerConfig,
    ) -> Result<Self, DeviceError> {
        let mut link = SerialLink::new(port, name);
        link.clear_input()?;

        let mut controller = Self {
            link: Some(link),
            config,
            identity: Vec::new(),
            points: AcquisitionSettings::default().points,
        };

        let timeout = controller.config.command_timeout;
        controller.identity = match controller.execute("info", timeout) {
            Ok(lines) => lines,
            Err(DeviceError::CommandTimeout { .. }) => {
                return Err(DeviceError::DeviceNotFound {
                    device: DEVICE,
                    detail: format!(
                        "{} did not answer 'info' within {:?}",
                        controller.port_name(),
                        timeout
                    ),
                })
            }
            Err(e) => return Err(e),
        };
        info!(
            "Analyzer connected on {}: {}",
            controller.port_name(),
            controller.model()
        );

        for cmd in MODE_COMMANDS {
            controller.execute(cmd, timeout)?;
        }
        Ok(controller)
    }

    /// Name of the open port, or an empty string once closed
    pub fn port_name(&self) -> &str {
        self.link.as_ref().map(|l| l.name()).unwrap_or_default()
    }

    /// Lines returned by `info`
    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    /// First `info` line, usually the model and firmware version
    pub fn model(&self) -> &str {
        self.identity
            .first()
            .map(String::as_str)
            .unwrap_or("unknown model")
    }

    /// Apply acquisition settings for the coming sweep
    pub fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), DeviceError> {
        let timeout = self.config.command_timeout;
        let rbw = match settings.rbw {
            Rbw::Auto => "rbw auto".to_string(),
            Rbw::Khz(khz) => format!("rbw {}", khz),
        };
        let attenuation = match settings.attenuation {
            Attenuation::Auto => "attenuate auto".to_string(),
            Attenuation::Db(db) => format!("attenuate {}", db),
        };
        let averaging = match settings.averaging {
            Averaging::Off => "calc off",
            Averaging::Four => "calc aver4",
            Averaging::Sixteen => "calc aver16",
        };

        for cmd in [rbw.as_str(), attenuation.as_str(), averaging] {
            self.execute(cmd, timeout)?;
        }
        self.points = settings.points;
        debug!(
            "Analyzer configured: rbw {}, attenuation {}, averaging {}, {} points",
            settings.rbw,
            settings.attenuation,
            settings.averaging.count(),
            settings.points
        );
        Ok(())
    }

    /// Measure the strongest signal within `span_mhz` around `center_mhz`
    pub fn measure_peak(
        &mut self,
        center_mhz: f64,
        span_mhz: f64,
    ) -> Result<PeakReading, DeviceError> {
        let half = span_mhz / 2.0;
        let start_hz = mhz_to_hz(center_mhz - half);
        let stop_hz = mhz_to_hz(center_mhz + half);
        let command_timeout = self.config.command_timeout;
        let measurement_timeout = self.config.measurement_timeout;
        let points = self.points;

        if let Some(link) = self.link.as_mut() {
            link.clear_input()?;
        }
        self.execute("pause", command_timeout)?;
        let hop = self.execute(
            &format!(
                "hop {} {} {} {}",
                start_hz, stop_hz, points, OUTMASK_FREQ_LEVEL
            ),
            measurement_timeout,
        );
        let resumed = self.execute("resume", command_timeout);

        let lines = match hop {
            Ok(lines) => lines,
            Err(DeviceError::CommandTimeout { .. }) => {
                return Err(DeviceError::MeasurementTimeout {
                    center_mhz,
                    timeout: measurement_timeout,
                })
            }
            Err(e) => return Err(e),
        };
        if let Err(e) = resumed {
            if e.is_connection_loss() {
                return Err(e);
            }
            warn!("Analyzer did not resume after measurement: {}", e);
        }

        let readings = parse_readings(&lines).map_err(|reason| DeviceError::MeasurementFailed {
            center_mhz,
            reason,
        })?;
        readings
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(hz, dbm)| PeakReading {
                power_dbm: dbm,
                frequency_mhz: hz / 1e6,
            })
            .ok_or_else(|| DeviceError::MeasurementFailed {
                center_mhz,
                reason: "no data points returned".to_string(),
            })
    }

    /// Sweep `start_mhz..=stop_mhz` once and return (MHz, dBm) pairs.
    ///
    /// Continuous sweeping is paused for the scan and resumed afterwards.
    pub fn quick_scan(
        &mut self,
        start_mhz: f64,
        stop_mhz: f64,
        points: usize,
    ) -> Result<Vec<(f64, f64)>, DeviceError> {
        let center_mhz = (start_mhz + stop_mhz) / 2.0;
        let command_timeout = self.config.command_timeout;
        let timeout = self.config.measurement_timeout;
        let cmd = format!(
            "scan {} {} {} {}",
            mhz_to_hz(start_mhz),
            mhz_to_hz(stop_mhz),
            points,
            OUTMASK_FREQ_LEVEL
        );

        if let Some(link) = self.link.as_mut() {
            link.clear_input()?;
        }
        self.execute("pause", command_timeout)?;
        let scanned = self.execute(&cmd, timeout);
        let resumed = self.execute("resume", command_timeout);

        let lines = match scanned {
            Ok(lines) => lines,
            Err(DeviceError::CommandTimeout { .. }) => {
                return Err(DeviceError::MeasurementTimeout {
                    center_mhz,
                    timeout,
                })
            }
            Err(e) => return Err(e),
        };
        if let Err(e) = resumed {
            if e.is_connection_loss() {
                return Err(e);
            }
            warn!("Analyzer did not resume after scan: {}", e);
        }
        let readings = parse_readings(&lines)
            .map_err(|reason| DeviceError::MeasurementFailed { center_mhz, reason })?;
        if readings.is_empty() {
            return Err(DeviceError::MeasurementFailed {
                center_mhz,
                reason: "scan returned no data".to_string(),
            });
        }
        Ok(readings
            .into_iter()
            .map(|(hz, dbm)| (hz / 1e6, dbm))
            .collect())
    }

    /// Resume continuous sweeping and release the port
    pub fn close(&mut self) -> Result<(), DeviceError> {
        if self.link.is_none() {
            return Ok(());
        }
        let timeout = self.config.command_timeout;
        let resumed = self.execute("resume", timeout);
        if let Some(link) = self.link.take() {
            debug!("Closing analyzer on {}", link.name());
        }
        resumed.map(|_| ())
    }

    /// Run one shell command and return its output lines (echo removed)
    fn execute(&mut self, cmd: &str, timeout: Duration) -> Result<Vec<String>, DeviceError> {
        let link = self.link.as_mut().ok_or(DeviceError::NotConnected(DEVICE))?;
        link.send(&format!("{}\r", cmd))?;

        let text = link
            .read_until(PROMPT, timeout)?
            .ok_or_else(|| DeviceError::CommandTimeout {
                device: DEVICE,
                command: cmd.to_string(),
                timeout,
            })?;

        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != cmd)
            .map(str::to_string)
            .collect();

        // The shell answers an unknown command or bad arguments with "<name>?"
        let verb = cmd.split_whitespace().next().unwrap_or(cmd);
        if let Some(bad) = lines.iter().find(|l| *l == &format!("{}?", verb)) {
            return Err(DeviceError::CommandRejected {
                device: DEVICE,
                command: cmd.to_string(),
                reply: bad.clone(),
            });
        }
        Ok(lines)
    }
}

impl<P: Port> SpectrumAnalyzer for AnalyzerController<P> {
    fn configure(&mut self, settings: &AcquisitionSettings) -> Result<(), DeviceError> {
        AnalyzerController::configure(self, settings)
    }

    fn measure_peak(&mut self, center_mhz: f64, span_mhz: f64) -> Result<PeakReading, DeviceError> {
        AnalyzerController::measure_peak(self, center_mhz, span_mhz)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        AnalyzerController::close(self)
    }
}

fn mhz_to_hz(mhz: f64) -> u64 {
    (mhz * 1e6).round().max(0.0) as u64
}

/// Parse `<freq_hz> <level_dbm>` lines
fn parse_readings(lines: &[String]) -> Result<Vec<(f64, f64)>, String> {
    lines
        .iter()
        .map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(freq), Some(level)) => {
                    let freq: f64 = freq
                        .parse()
                        .map_err(|_| format!("bad frequency in '{}'", line))?;
                    let level: f64 = level
                        .parse()
                        .map_err(|_| format!("bad level in '{}'", line))?;
                    if level.is_finite() {
                        Ok((freq, level))
                    } else {
                        Err(format!("non-finite level in '{}'", line))
                    }
                }
                _ => Err(format!("expected '<freq> <level>', got '{}'", line)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_readings() {
        let lines = vec![
            "924500000 -45.5".to_string(),
            "925000000 -12.25".to_string(),
        ];
        let readings = parse_readings(&lines).unwrap();
        assert_eq!(readings, vec![(924_500_000.0, -45.5), (925_000_000.0, -12.25)]);
    }

    #[test]
    fn test_parse_readings_rejects_garbage() {
        assert!(parse_readings(&["usage: hop".to_string()]).is_err());
        assert!(parse_readings(&["925000000 nan".to_string()]).is_err());
        assert!(parse_readings(&["925000000".to_string()]).is_err());
    }

    #[test]
    fn test_mhz_to_hz_rounds() {
        assert_eq!(mhz_to_hz(924.5), 924_500_000);
        assert_eq!(mhz_to_hz(900.2), 900_200_000);
        assert_eq!(mhz_to_hz(-1.0), 0);
    }
}
