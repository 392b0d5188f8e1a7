//! Wire-protocol tests for the instrument controllers
//!
//! A scripted port answers each complete command line the controllers write,
//! standing in for the Arduino firmware and the tinySA shell.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lo_sweep::device::{
    AnalyzerConfig, AnalyzerController, DeviceError, Port, SignalSource, SourceConfig,
    SourceController, SpectrumAnalyzer,
};
use lo_sweep::plan::{AcquisitionSettings, Attenuation, Averaging, FrequencyList, Rbw};
use lo_sweep::sweep::{CancelToken, ToneSweep};

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// Port that runs `responder` on every line written to it and queues the
/// reply for reading. `None` leaves the line unanswered.
struct ScriptedPort {
    responder: Responder,
    partial: Vec<u8>,
    output: VecDeque<u8>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPort {
    fn new(responder: impl FnMut(&str) -> Option<String> + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            partial: Vec::new(),
            output: VecDeque::new(),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn log(&self) -> Arc<Mutex<Vec<String>>> {
        self.commands.clone()
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.commands.lock().unwrap().push(line.clone());
                if let Some(reply) = (self.responder)(&line) {
                    self.output.extend(reply.into_bytes());
                }
            } else {
                self.partial.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for ScriptedPort {
    fn clear_input(&mut self) -> io::Result<()> {
        self.output.clear();
        Ok(())
    }
}

fn fast_source_config() -> SourceConfig {
    SourceConfig {
        reply_timeout: Duration::from_millis(200),
        reset_delay: Duration::ZERO,
        quiet_period: Duration::from_millis(10),
        discovery_timeout: Duration::from_millis(200),
        ..SourceConfig::default()
    }
}

fn fast_analyzer_config() -> AnalyzerConfig {
    AnalyzerConfig {
        command_timeout: Duration::from_millis(200),
        measurement_timeout: Duration::from_millis(300),
        ..AnalyzerConfig::default()
    }
}

/// Firmware that tracks its own state and reports it after every command
fn arduino() -> impl FnMut(&str) -> Option<String> + Send {
    const BAND_STARTS: [f64; 2] = [900.0, 2400.0];
    let mut band = 0_usize;
    let mut freq = 900.0_f64;
    let mut power = 0_i32;
    move |line: &str| {
        let mut parts = line.split_whitespace();
        let reply = match (parts.next(), parts.next()) {
            (Some("f"), Some(value)) => match value.parse::<f64>() {
                Ok(f) if (35.0..=4400.0).contains(&f) => {
                    freq = f;
                    format!("OK Freq: {:.3} MHz\r\n", freq)
                }
                _ => "ERR frequency out of range\r\n".to_string(),
            },
            (Some("p"), Some(value)) => match value.parse::<i32>() {
                Ok(p) => {
                    power = p;
                    format!("OK Power: {:+} dBm\r\n", power)
                }
                Err(_) => "ERR bad power\r\n".to_string(),
            },
            (Some("r"), None) => {
                freq = BAND_STARTS[band];
                "OK\r\n".to_string()
            }
            (Some("a"), None) => {
                band = 1 - band;
                freq = BAND_STARTS[band];
                format!("OK Band {}\r\n", if band == 0 { 'A' } else { 'B' })
            }
            (Some("s"), None) => format!("Freq: {:.3} MHz\r\nPower: {:+} dBm\r\n", freq, power),
            _ => "ERR unknown command\r\n".to_string(),
        };
        Some(reply)
    }
}

/// tinySA shell with a single carrier at `carrier_mhz`
fn tinysa(carrier_mhz: f64, level_dbm: f64) -> impl FnMut(&str) -> Option<String> + Send {
    move |line: &str| {
        let mut body = String::new();
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["info"] => body.push_str("tinySA ULTRA\r\nHW Version:V0.4.5.1\r\n"),
            ["hop", start, stop, points, "3"] | ["scan", start, stop, points, "3"] => {
                let start: f64 = start.parse().unwrap();
                let stop: f64 = stop.parse().unwrap();
                let points: usize = points.parse().unwrap();
                for i in 0..points {
                    let hz = start + (stop - start) * i as f64 / (points - 1) as f64;
                    let offset = (hz / 1e6 - carrier_mhz).abs();
                    let level = if offset < 0.05 { level_dbm } else { -90.0 + i as f64 * 0.01 };
                    body.push_str(&format!("{:.0} {:.2}\r\n", hz, level));
                }
            }
            ["bogus", ..] => body.push_str("bogus?\r\n"),
            _ => {}
        }
        Some(format!("{}\r\n{}ch> ", line, body))
    }
}

#[test]
fn test_source_connect_and_commands() {
    let port = ScriptedPort::new(arduino());
    let log = port.log();

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    assert_eq!(source.port_name(), "scripted");
    assert_eq!(source.status().frequency_mhz, Some(900.0));

    source.set_power(-10).unwrap();
    source.set_frequency(925.2).unwrap();
    let status = source.query_status().unwrap();
    assert_eq!(status.frequency_mhz, Some(925.2));
    assert_eq!(status.power_dbm, Some(-10));

    let commands = log.lock().unwrap().clone();
    assert_eq!(commands, vec!["s", "p -10", "f 925.200", "s"]);
}

#[test]
fn test_source_positive_power_is_signed() {
    let port = ScriptedPort::new(arduino());
    let log = port.log();

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    SignalSource::set_power(&mut source, 5).unwrap();
    assert!(log.lock().unwrap().contains(&"p +5".to_string()));
    assert_eq!(SignalSource::status(&source).power_dbm, Some(5));
}

#[test]
fn test_silent_source_is_not_found() {
    let port = ScriptedPort::new(|_line: &str| None);

    let err = SourceController::with_port(port, "silent", fast_source_config())
        .err()
        .unwrap();
    assert!(matches!(err, DeviceError::DeviceNotFound { device: "source", .. }));
}

#[test]
fn test_source_error_reply_is_rejection() {
    let port = ScriptedPort::new(arduino());

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    let err = source.set_frequency(10.0).unwrap_err();
    match err {
        DeviceError::CommandRejected { command, reply, .. } => {
            assert_eq!(command, "f 10.000");
            assert!(reply.contains("out of range"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    // The link stays usable after a rejection
    assert!(source.query_status().is_ok());
}

#[test]
fn test_source_unresponsive_mid_session() {
    let mut alive = true;
    let mut firmware = arduino();
    let port = ScriptedPort::new(move |line: &str| {
        if line.starts_with('f') {
            alive = false;
        }
        if alive {
            firmware(line)
        } else {
            None
        }
    });

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    let err = source.set_frequency(925.0).unwrap_err();
    assert!(err.is_timeout());
    assert!(!err.is_connection_loss());
}

#[test]
fn test_closed_source_is_not_connected() {
    let port = ScriptedPort::new(arduino());

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    source.close();
    assert_eq!(source.port_name(), "");
    assert!(matches!(
        source.set_power(5),
        Err(DeviceError::NotConnected("source"))
    ));
}

#[test]
fn test_source_band_commands_refresh_status() {
    let port = ScriptedPort::new(arduino());
    let log = port.log();

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    source.set_frequency(925.0).unwrap();

    let status = source.toggle_band().unwrap();
    assert_eq!(status.frequency_mhz, Some(2400.0));
    source.set_frequency(2410.0).unwrap();
    let status = source.reset_to_band_start().unwrap();
    assert_eq!(status.frequency_mhz, Some(2400.0));
    assert_eq!(source.status().frequency_mhz, Some(2400.0));

    let commands = log.lock().unwrap().clone();
    assert_eq!(
        commands,
        vec!["s", "f 925.000", "a", "s", "f 2410.000", "r", "s"]
    );
}

#[test]
fn test_tone_sweep_over_serial() {
    let port = ScriptedPort::new(arduino());
    let log = port.log();

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    log.lock().unwrap().clear();

    let frequencies = FrequencyList::from_range(900.0, 901.0, 0.5).unwrap();
    let report = ToneSweep::new(frequencies, 5)
        .with_dwell(Duration::ZERO)
        .with_passes(Some(1))
        .run(&mut source)
        .unwrap();
    assert_eq!(report.passes_completed, 1);
    assert_eq!(report.steps, 3);

    let commands = log.lock().unwrap().clone();
    assert_eq!(
        commands,
        vec!["p +5", "f 900.000", "f 900.500", "f 901.000", "f 900.000"]
    );
    // The source is released once the sweep ends
    assert!(matches!(
        source.set_power(5),
        Err(DeviceError::NotConnected("source"))
    ));
}

#[test]
fn test_tone_sweep_cancelled_returns_to_start() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let mut firmware = arduino();
    let port = ScriptedPort::new(move |line: &str| {
        if line == "f 901.000" {
            trigger.cancel();
        }
        firmware(line)
    });
    let log = port.log();

    let mut source = SourceController::with_port(port, "scripted", fast_source_config()).unwrap();
    log.lock().unwrap().clear();

    let frequencies = FrequencyList::from_range(900.0, 902.0, 1.0).unwrap();
    let report = ToneSweep::new(frequencies, -4)
        .with_dwell(Duration::ZERO)
        .with_cancel(cancel)
        .run(&mut source)
        .unwrap();
    assert!(report.interrupted);
    assert_eq!(report.passes_completed, 0);

    let commands = log.lock().unwrap().clone();
    assert_eq!(commands, vec!["p -4", "f 900.000", "f 901.000", "f 900.000"]);
}

#[test]
fn test_analyzer_connect_sets_mode() {
    let port = ScriptedPort::new(tinysa(925.0, -12.5));
    let log = port.log();

    let analyzer = AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    assert_eq!(analyzer.model(), "tinySA ULTRA");
    assert_eq!(analyzer.identity().len(), 2);

    let commands = log.lock().unwrap().clone();
    assert_eq!(
        commands,
        vec!["info", "mode low input", "agc auto", "attenuate auto", "rbw auto"]
    );
}

#[test]
fn test_analyzer_configure_commands() {
    let port = ScriptedPort::new(tinysa(925.0, -12.5));
    let log = port.log();

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    log.lock().unwrap().clear();

    analyzer
        .configure(&AcquisitionSettings {
            rbw: Rbw::Khz(100.0),
            attenuation: Attenuation::Db(10),
            averaging: Averaging::Sixteen,
            ..AcquisitionSettings::default()
        })
        .unwrap();

    let commands = log.lock().unwrap().clone();
    assert_eq!(commands, vec!["rbw 100", "attenuate 10", "calc aver16"]);
}

#[test]
fn test_analyzer_measure_peak() {
    let port = ScriptedPort::new(tinysa(925.0, -12.5));
    let log = port.log();

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    log.lock().unwrap().clear();

    let peak = SpectrumAnalyzer::measure_peak(&mut analyzer, 925.0, 1.0).unwrap();
    assert_eq!(peak.power_dbm, -12.5);
    assert!((peak.frequency_mhz - 925.0).abs() < 0.05);

    let commands = log.lock().unwrap().clone();
    assert_eq!(
        commands,
        vec!["pause", "hop 924500000 925500000 51 3", "resume"]
    );
}

#[test]
fn test_analyzer_hop_timeout() {
    let mut shell = tinysa(925.0, -12.5);
    let port = ScriptedPort::new(move |line: &str| {
        if line.starts_with("hop") {
            None
        } else {
            shell(line)
        }
    });

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    let err = analyzer.measure_peak(925.0, 1.0).unwrap_err();
    assert!(matches!(err, DeviceError::MeasurementTimeout { center_mhz, .. } if center_mhz == 925.0));
}

#[test]
fn test_analyzer_garbage_is_measurement_failure() {
    let mut shell = tinysa(925.0, -12.5);
    let port = ScriptedPort::new(move |line: &str| {
        if line.starts_with("hop") {
            Some(format!("{}\r\nusage: hop {{start}} {{stop}}\r\nch> ", line))
        } else {
            shell(line)
        }
    });

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    let err = analyzer.measure_peak(925.0, 1.0).unwrap_err();
    assert!(matches!(err, DeviceError::MeasurementFailed { .. }));
}

#[test]
fn test_analyzer_unknown_command_rejected() {
    let mut shell = tinysa(925.0, -12.5);
    let port = ScriptedPort::new(move |line: &str| {
        if line.starts_with("calc") {
            Some(format!("{}\r\ncalc?\r\nch> ", line))
        } else {
            shell(line)
        }
    });

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    let err = analyzer.configure(&AcquisitionSettings::default()).unwrap_err();
    assert!(matches!(err, DeviceError::CommandRejected { reply, .. } if reply == "calc?"));
}

#[test]
fn test_quick_scan_resumes_after_timeout() {
    let mut shell = tinysa(930.0, -20.0);
    let port = ScriptedPort::new(move |line: &str| {
        if line.starts_with("scan") {
            None
        } else {
            shell(line)
        }
    });
    let log = port.log();

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    log.lock().unwrap().clear();
    let err = analyzer.quick_scan(900.0, 960.0, 61).unwrap_err();
    assert!(matches!(err, DeviceError::MeasurementTimeout { .. }));
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("resume"));
}

#[test]
fn test_silent_analyzer_is_not_found() {
    let port = ScriptedPort::new(|_line: &str| None);

    let err = AnalyzerController::with_port(port, "silent", fast_analyzer_config())
        .err()
        .unwrap();
    assert!(matches!(err, DeviceError::DeviceNotFound { device: "analyzer", .. }));
}

#[test]
fn test_quick_scan() {
    let port = ScriptedPort::new(tinysa(930.0, -20.0));
    let log = port.log();

    let mut analyzer =
        AnalyzerController::with_port(port, "scripted", fast_analyzer_config()).unwrap();
    log.lock().unwrap().clear();
    let readings = analyzer.quick_scan(900.0, 960.0, 61).unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["pause", "scan 900000000 960000000 61 3", "resume"]
    );
    assert_eq!(readings.len(), 61);
    assert_eq!(readings[0].0, 900.0);
    assert_eq!(readings[60].0, 960.0);

    let peak = readings
        .iter()
        .copied()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();
    assert_eq!(peak, (930.0, -20.0));

    analyzer.close().unwrap();
    assert!(matches!(
        analyzer.measure_peak(925.0, 1.0),
        Err(DeviceError::NotConnected("analyzer"))
    ));
}
