//! Controller for the Arduino-driven ADF4351 frequency source.
//!
//! The firmware speaks a line protocol at 115200 baud:
//!
//! | Command      | Meaning                 |
//! |--------------|-------------------------|
//! | `f 925.000`  | set output frequency    |
//! | `p +5`       | set output power (dBm)  |
//! | `s`          | report status           |
//! | `r`          | back to the band start  |
//! | `a`          | switch band A / band B  |
//!
//! Every command is answered with at least one line; a line containing `ERR`
//! marks a rejected command. Status lines look like `Freq: 925.000 MHz` and
//! `Power: +5 dBm`.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::SerialPort;

use super::discovery::{list_ports, source_candidates, PortSpec};
use super::error::DeviceError;
use super::link::{open_serial, Port, SerialLink};
use super::SignalSource;

const DEVICE: &str = "source";

/// Connection and timing parameters for the source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Maximum wait for the first reply line of a command
    pub reply_timeout: Duration,
    /// Wait after opening the port; opening resets the Arduino
    pub reset_delay: Duration,
    /// Silence that ends a multi-line reply
    pub quiet_period: Duration,
    /// Maximum wait for the status reply while probing a port
    pub discovery_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            reply_timeout: Duration::from_secs(2),
            reset_delay: Duration::from_secs(2),
            quiet_period: Duration::from_millis(50),
            discovery_timeout: Duration::from_secs(3),
        }
    }
}

/// Last known output state of the source
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceStatus {
    /// Output frequency in MHz
    pub frequency_mhz: Option<f64>,
    /// Output power in dBm
    pub power_dbm: Option<i32>,
}

impl SourceStatus {
    /// Extract `Freq:` / `Power:` fields from reply lines.
    ///
    /// Fields that do not appear stay `None`.
    pub fn parse(lines: &[String]) -> Self {
        let mut status = SourceStatus::default();
        for line in lines {
            if let Some(freq) = field_after(line, "Freq:").and_then(|v| v.parse::<f64>().ok()) {
                status.frequency_mhz = Some(freq);
            }
            if let Some(power) = field_after(line, "Power:").and_then(|v| v.parse::<f64>().ok()) {
                status.power_dbm = Some(power.round() as i32);
            }
        }
        status
    }

    fn merge(&mut self, other: SourceStatus) {
        if other.frequency_mhz.is_some() {
            self.frequency_mhz = other.frequency_mhz;
        }
        if other.power_dbm.is_some() {
            self.power_dbm = other.power_dbm;
        }
    }
}

/// First whitespace-separated token after `key`, stripped of separators
fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    line[start..]
        .split_whitespace()
        .next()
        .map(|token| token.trim_end_matches([',', ';']))
}

/// Serial client for the LO source
pub struct SourceController<P: Port = Box<dyn SerialPort>> {
    link: Option<SerialLink<P>>,
    config: SourceConfig,
    status: SourceStatus,
}

impl SourceController<Box<dyn SerialPort>> {
    /// Open the source on a fixed port, or probe every candidate port when
    /// `spec` is [`PortSpec::Auto`].
    pub fn connect(spec: &PortSpec, config: SourceConfig) -> Result<Self, DeviceError> {
        match spec {
            PortSpec::Path(path) => Self::open(path, config),
            PortSpec::Auto => {
                let candidates = source_candidates(&list_ports()?);
                if candidates.is_empty() {
                    return Err(DeviceError::DeviceNotFound {
                        device: DEVICE,
                        detail: "no serial ports available".to_string(),
                    });
                }

                let mut rejected = Vec::with_capacity(candidates.len());
                for name in candidates {
                    info!("Probing {} for the source", name);
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

    fn open(path: &str, config: SourceConfig) -> Result<Self, DeviceError> {
        let port = open_serial(path, config.baud_rate)?;
        Self::with_port(port, path, config)
    }
}

impl<P: Port> SourceController<P> {
    /// Take over an already open port.
    ///
    /// Waits out the reset delay, discards boot chatter and checks the
    /// firmware answers a status query.
    pub fn with_port(
        port: P,
        name: impl Into<String>,
        config: SourceConfig,
    ) -> Result<Self, DeviceError> {
        let mut link = SerialLink::new(port, name);
        if !config.reset_delay.is_zero() {
            debug!(
                "Waiting {:?} for {} to finish resetting",
                config.reset_delay,
                link.name()
            );
            thread::sleep(config.reset_delay);
        }
        link.clear_input()?;

        let mut controller = Self {
            link: Some(link),
            config,
            status: SourceStatus::default(),
        };
        let timeout = controller.config.discovery_timeout;
        let lines = match controller.exchange("s", timeout) {
            Ok(lines) => lines,
            Err(DeviceError::CommandTimeout { .. }) => {
                return Err(DeviceError::DeviceNotFound {
                    device: DEVICE,
                    detail: format!(
                        "{} did not answer a status query within {:?}",
                        controller.port_name(),
                        timeout
                    ),
                })
            }
            Err(e) => return Err(e),
        };
        controller.status = SourceStatus::parse(&lines);
        info!(
            "Source connected on {} ({})",
            controller.port_name(),
            lines.join(" | ")
        );
        Ok(controller)
    }

    /// Name of the open port, or an empty string once closed
    pub fn port_name(&self) -> &str {
        self.link.as_ref().map(|l| l.name()).unwrap_or_default()
    }

    /// Last known output state
    pub fn status(&self) -> SourceStatus {
        self.status
    }

    /// Query and return the device's current state
    pub fn query_status(&mut self) -> Result<SourceStatus, DeviceError> {
        let lines = self.command("s")?;
        let reported = SourceStatus::parse(&lines);
        if reported == SourceStatus::default() {
            return Err(DeviceError::Protocol {
                device: DEVICE,
                detail: format!("status reply without fields: {}", lines.join(" | ")),
            });
        }
        self.status.merge(reported);
        Ok(self.status)
    }

    /// Tune the output frequency
    pub fn set_frequency(&mut self, mhz: f64) -> Result<(), DeviceError> {
        let lines = self.command(&format!("f {:.3}", mhz))?;
        let echoed = SourceStatus::parse(&lines);
        self.status.frequency_mhz = echoed.frequency_mhz.or(Some(mhz));
        if echoed.power_dbm.is_some() {
            self.status.power_dbm = echoed.power_dbm;
        }
        Ok(())
    }

    /// Set the output power
    pub fn set_power(&mut self, dbm: i32) -> Result<(), DeviceError> {
        let lines = self.command(&format!("p {:+}", dbm))?;
        let echoed = SourceStatus::parse(&lines);
        self.status.power_dbm = echoed.power_dbm.or(Some(dbm));
        if echoed.frequency_mhz.is_some() {
            self.status.frequency_mhz = echoed.frequency_mhz;
        }
        Ok(())
    }

    /// Return the output to the start of the current band
    pub fn reset_to_band_start(&mut self) -> Result<SourceStatus, DeviceError> {
        self.command("r")?;
        self.query_status()
    }

    /// Switch between the firmware's two bands
    pub fn toggle_band(&mut self) -> Result<SourceStatus, DeviceError> {
        self.command("a")?;
        self.query_status()
    }

    /// Release the port. Further commands fail with `NotConnected`.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            debug!("Closing source on {}", link.name());
        }
    }

    fn command(&mut self, cmd: &str) -> Result<Vec<String>, DeviceError> {
        let timeout = self.config.reply_timeout;
        self.exchange(cmd, timeout)
    }

    /// Send one command and collect its reply lines
    fn exchange(&mut self, cmd: &str, timeout: Duration) -> Result<Vec<String>, DeviceError> {
        let quiet = self.config.quiet_period;
        let link = self.link.as_mut().ok_or(DeviceError::NotConnected(DEVICE))?;

        link.clear_input()?;
        link.send(&format!("{}\n", cmd))?;

        let deadline = Instant::now() + timeout;
        let first = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match link.read_line(remaining)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line.trim().to_string(),
                None => {
                    return Err(DeviceError::CommandTimeout {
                        device: DEVICE,
                        command: cmd.to_string(),
                        timeout,
                    })
                }
            }
        };

        let mut lines = vec![first];
        lines.extend(link.drain_lines(quiet)?);

        if let Some(bad) = lines.iter().find(|l| l.contains("ERR")) {
            warn!("Source rejected '{}': {}", cmd, bad);
            return Err(DeviceError::CommandRejected {
                device: DEVICE,
                command: cmd.to_string(),
                reply: bad.clone(),
            });
        }
        Ok(lines)
    }
}

impl<P: Port> SignalSource for SourceController<P> {
    fn set_frequency(&mut self, mhz: f64) -> Result<(), DeviceError> {
        SourceController::set_frequency(self, mhz)
    }

    fn set_power(&mut self, dbm: i32) -> Result<(), DeviceError> {
        SourceController::set_power(self, dbm)
    }

    fn status(&self) -> SourceStatus {
        SourceController::status(self)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        SourceController::close(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_status_two_lines() {
        let status = SourceStatus::parse(&lines(&["Freq: 900.0 MHz", "Power: +5 dBm"]));
        assert_eq!(status.frequency_mhz, Some(900.0));
        assert_eq!(status.power_dbm, Some(5));
    }

    #[test]
    fn test_parse_status_single_line_negative_power() {
        let status = SourceStatus::parse(&lines(&["Freq: 925.200 MHz, Power: -4 dBm"]));
        assert_eq!(status.frequency_mhz, Some(925.2));
        assert_eq!(status.power_dbm, Some(-4));
    }

    #[test]
    fn test_parse_status_plain_ack() {
        let status = SourceStatus::parse(&lines(&["OK"]));
        assert_eq!(status, SourceStatus::default());
    }

    #[test]
    fn test_field_after() {
        assert_eq!(field_after("Power: +5 dBm", "Power:"), Some("+5"));
        assert_eq!(field_after("Freq: 1.5, x", "Freq:"), Some("1.5"));
        assert_eq!(field_after("Freq:", "Freq:"), None);
        assert_eq!(field_after("nothing", "Freq:"), None);
    }
}
