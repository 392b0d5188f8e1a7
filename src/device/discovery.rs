//! Serial port enumeration and classification.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serialport::{SerialPortInfo, SerialPortType};

use super::error::DeviceError;

/// USB vendor/product id of the tinySA (STM32 virtual COM port)
pub const TINYSA_VID_PID: (u16, u16) = (0x0483, 0x5740);

/// Vendor ids of boards and USB-serial bridges an Arduino shows up as
const ARDUINO_VIDS: &[u16] = &[
    0x2341, // Arduino
    0x2A03, // Arduino (arduino.org)
    0x1A86, // QinHeng CH340
    0x10C4, // Silicon Labs CP210x
    0x0403, // FTDI
];

/// Substrings matched against manufacturer/product strings
const ARDUINO_KEYWORDS: &[&str] = &["arduino", "ch340", "cp2102", "ftdi", "usb serial"];

/// Where to find a device: a fixed port or discovery
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PortSpec {
    /// Probe every plausible port
    #[default]
    Auto,
    /// Fixed device path (`/dev/ttyACM0`, `COM3`)
    Path(String),
}

impl FromStr for PortSpec {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            Ok(PortSpec::Auto)
        } else {
            Ok(PortSpec::Path(s.to_string()))
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Auto => write!(f, "auto"),
            PortSpec::Path(path) => write!(f, "{}", path),
        }
    }
}

/// What a port most likely is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Arduino board or generic USB-serial bridge
    ArduinoLike,
    /// tinySA spectrum analyzer
    TinySa,
    /// Anything else
    Other,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortKind::ArduinoLike => "arduino-like",
            PortKind::TinySa => "tinySA",
            PortKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A serial port with the USB details we use for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device path
    pub name: String,
    /// USB vendor id, if the port is USB
    pub vid: Option<u16>,
    /// USB product id, if the port is USB
    pub pid: Option<u16>,
    /// USB manufacturer string
    pub manufacturer: Option<String>,
    /// USB product string
    pub product: Option<String>,
    /// Classification
    pub kind: PortKind,
}

impl PortInfo {
    /// Classify a raw port description
    pub fn classify(
        name: impl Into<String>,
        vid: Option<u16>,
        pid: Option<u16>,
        manufacturer: Option<String>,
        product: Option<String>,
    ) -> Self {
        let kind = match (vid, pid) {
            (Some(v), Some(p)) if (v, p) == TINYSA_VID_PID => PortKind::TinySa,
            (Some(v), _) if ARDUINO_VIDS.contains(&v) => PortKind::ArduinoLike,
            _ => {
                let text = format!(
                    "{} {}",
                    manufacturer.as_deref().unwrap_or_default(),
                    product.as_deref().unwrap_or_default()
                )
                .to_lowercase();
                if ARDUINO_KEYWORDS.iter().any(|k| text.contains(k)) {
                    PortKind::ArduinoLike
                } else {
                    PortKind::Other
                }
            }
        };
        Self {
            name: name.into(),
            vid,
            pid,
            manufacturer,
            product,
            kind,
        }
    }

    /// Human readable description for `ports` output
    pub fn description(&self) -> String {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => format!(
                "USB {:04x}:{:04x} {} {}",
                vid,
                pid,
                self.manufacturer.as_deref().unwrap_or("-"),
                self.product.as_deref().unwrap_or("-")
            ),
            _ => "non-USB".to_string(),
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => PortInfo::classify(
                info.port_name,
                Some(usb.vid),
                Some(usb.pid),
                usb.manufacturer,
                usb.product,
            ),
            _ => PortInfo::classify(info.port_name, None, None, None, None),
        }
    }
}

/// Enumerate and classify every serial port on the system
pub fn list_ports() -> Result<Vec<PortInfo>, DeviceError> {
    let ports: Vec<PortInfo> = serialport::available_ports()?
        .into_iter()
        .map(PortInfo::from)
        .collect();
    debug!("Found {} serial port(s)", ports.len());
    Ok(ports)
}

/// Ports to probe for the source, best guesses first.
///
/// Arduino-like ports come first, then unclassified ones. The tinySA is never
/// a candidate.
pub fn source_candidates(ports: &[PortInfo]) -> Vec<String> {
    let mut ranked: Vec<&PortInfo> = ports
        .iter()
        .filter(|p| p.kind != PortKind::TinySa)
        .collect();
    ranked.sort_by_key(|p| p.kind != PortKind::ArduinoLike);
    ranked.into_iter().map(|p| p.name.clone()).collect()
}

/// Ports matching the tinySA USB ids
pub fn analyzer_candidates(ports: &[PortInfo]) -> Vec<String> {
    ports
        .iter()
        .filter(|p| p.kind == PortKind::TinySa)
        .map(|p| p.name.clone())
        .collect()
}
