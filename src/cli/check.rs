use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use log::info;

#[cfg(feature = "colorized_output")]
use console::style;

use lo_sweep::device::{
    AnalyzerConfig, AnalyzerController, DeviceError, Port, PortSpec, SourceConfig,
    SourceController,
};
use lo_sweep::plan::{AcquisitionSettings, Averaging};

use super::config::Config;
use super::sweep::{analyzer_config, port_spec, source_config};

const TEST_FREQUENCY_MHZ: f64 = 925.0;
const TEST_POWER_DBM: i32 = 5;
const TEST_SPAN_MHZ: f64 = 2.0;

/// Result of one instrument test
#[derive(Debug)]
struct DeviceCheck {
    device: &'static str,
    port: Option<String>,
    details: Vec<String>,
    error: Option<DeviceError>,
}

impl DeviceCheck {
    fn new(device: &'static str) -> Self {
        Self {
            device,
            port: None,
            details: Vec::new(),
            error: None,
        }
    }

    fn passed(&self) -> bool {
        self.error.is_none()
    }

    fn finish(mut self, result: Result<(), DeviceError>) -> Self {
        self.error = result.err();
        self
    }
}

/// Self-test outcome for both instruments
#[derive(Debug)]
struct CheckReport {
    checks: Vec<DeviceCheck>,
}

impl CheckReport {
    fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }

    fn all_passed(&self) -> bool {
        self.passed_count() == self.checks.len()
    }

    fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static PASS: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("Instrument Self-Test").bold().cyan()));
            output.push_str(&format!("{}\n", style("====================").cyan()));

            for check in &self.checks {
                let port = check.port.as_deref().unwrap_or("-");
                match &check.error {
                    None => output.push_str(&format!(
                        "{} {} ({})\n",
                        PASS,
                        style(check.device).green(),
                        port
                    )),
                    Some(e) => output.push_str(&format!(
                        "{} {} ({}) - {}: {}\n",
                        FAIL,
                        style(check.device).red(),
                        port,
                        style("FAILED").red().bold(),
                        e
                    )),
                }
                for detail in &check.details {
                    output.push_str(&format!("    {}\n", detail));
                }
            }

            output.push('\n');
            let summary = format!("{}/{} instruments OK", self.passed_count(), self.checks.len());
            if self.all_passed() {
                output.push_str(&format!("{}\n", style(summary).green().bold()));
            } else {
                output.push_str(&format!("{}\n", style(summary).red().bold()));
            }
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instrument Self-Test")?;
        writeln!(f, "====================")?;
        for check in &self.checks {
            let port = check.port.as_deref().unwrap_or("-");
            match &check.error {
                None => writeln!(f, "✓ PASS {} ({})", check.device, port)?,
                Some(e) => writeln!(f, "✗ FAIL {} ({}): {}", check.device, port, e)?,
            }
            for detail in &check.details {
                writeln!(f, "    {}", detail)?;
            }
        }
        writeln!(f)?;
        writeln!(f, "{}/{} instruments OK", self.passed_count(), self.checks.len())
    }
}

fn check_source(spec: &PortSpec, config: SourceConfig) -> DeviceCheck {
    let mut check = DeviceCheck::new("source");
    let result = (|| -> Result<(), DeviceError> {
        let mut source = SourceController::connect(spec, config)?;
        check.port = Some(source.port_name().to_string());
        source.set_frequency(TEST_FREQUENCY_MHZ)?;
        source.set_power(TEST_POWER_DBM)?;
        let status = source.query_status()?;
        check.details.push(format!(
            "Status: {} MHz, {} dBm",
            status
                .frequency_mhz
                .map_or_else(|| "?".to_string(), |f| format!("{:.3}", f)),
            status
                .power_dbm
                .map_or_else(|| "?".to_string(), |p| format!("{:+}", p))
        ));
        source.close();
        Ok(())
    })();
    check.finish(result)
}

fn check_analyzer(spec: &PortSpec, config: AnalyzerConfig) -> DeviceCheck {
    match AnalyzerController::connect(spec, config) {
        Ok(analyzer) => exercise_analyzer(analyzer),
        Err(e) => DeviceCheck::new("analyzer").finish(Err(e)),
    }
}

/// Measure the test tone, then release the analyzer whatever the outcome
fn exercise_analyzer<P: Port>(mut analyzer: AnalyzerController<P>) -> DeviceCheck {
    let mut check = DeviceCheck::new("analyzer");
    check.port = Some(analyzer.port_name().to_string());
    check.details.push(format!("Model: {}", analyzer.model()));

    let measured = analyzer
        .configure(&AcquisitionSettings {
            span_mhz: TEST_SPAN_MHZ,
            averaging: Averaging::Off,
            ..AcquisitionSettings::default()
        })
        .and_then(|()| analyzer.measure_peak(TEST_FREQUENCY_MHZ, TEST_SPAN_MHZ));
    let closed = analyzer.close();

    let result = measured.and_then(|peak| {
        check.details.push(format!(
            "Peak: {:.2} dBm at {:.3} MHz",
            peak.power_dbm, peak.frequency_mhz
        ));
        closed
    });
    check.finish(result)
}

/// Test both instruments independently and report each result
pub fn run(source: Option<String>, analyzer: Option<String>, config: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    let source_spec = port_spec(source.as_deref().or(config.devices.source.as_deref()));
    let analyzer_spec = port_spec(analyzer.as_deref().or(config.devices.analyzer.as_deref()));

    info!("Testing source on {}", source_spec);
    let source_check = check_source(&source_spec, source_config(&config)?);
    info!("Testing analyzer on {}", analyzer_spec);
    let analyzer_check = check_analyzer(&analyzer_spec, analyzer_config(&config)?);

    let mut report = CheckReport {
        checks: vec![source_check, analyzer_check],
    };
    println!("{}", report.format_colored());

    match report.checks.iter_mut().find_map(|c| c.error.take()) {
        Some(e) => Err(anyhow::Error::new(e).context("Instrument self-test failed")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// tinySA shell that rejects `calc`, recording every command
    struct RejectingShell {
        partial: Vec<u8>,
        output: VecDeque<u8>,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl Read for RejectingShell {
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

    impl Write for RejectingShell {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            for &byte in buf {
                if byte != b'\r' {
                    self.partial.push(byte);
                    continue;
                }
                let line = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                let body = match line.split_whitespace().next() {
                    Some("info") => "tinySA ULTRA\r\n",
                    Some("calc") => "calc?\r\n",
                    _ => "",
                };
                self.output
                    .extend(format!("{}\r\n{}ch> ", line, body).into_bytes());
                self.commands.lock().unwrap().push(line);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Port for RejectingShell {
        fn clear_input(&mut self) -> io::Result<()> {
            self.output.clear();
            Ok(())
        }
    }

    #[test]
    fn test_failed_analyzer_check_still_resumes() {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let port = RejectingShell {
            partial: Vec::new(),
            output: VecDeque::new(),
            commands: commands.clone(),
        };
        let config = AnalyzerConfig {
            command_timeout: Duration::from_millis(200),
            measurement_timeout: Duration::from_millis(300),
            ..AnalyzerConfig::default()
        };
        let analyzer = AnalyzerController::with_port(port, "scripted", config).unwrap();

        let check = exercise_analyzer(analyzer);
        assert!(!check.passed());
        assert!(matches!(check.error, Some(DeviceError::CommandRejected { .. })));
        assert_eq!(check.port.as_deref(), Some("scripted"));

        let commands = commands.lock().unwrap();
        assert!(!commands.iter().any(|c| c.starts_with("hop")));
        assert_eq!(commands.last().map(String::as_str), Some("resume"));
    }

    #[test]
    fn test_report_display() {
        let mut ok = DeviceCheck::new("source");
        ok.port = Some("/dev/ttyUSB0".into());
        ok.details.push("Status: 925.000 MHz, +5 dBm".into());
        let failed = DeviceCheck::new("analyzer").finish(Err(DeviceError::DeviceNotFound {
            device: "analyzer",
            detail: "no tinySA port".into(),
        }));

        let report = CheckReport {
            checks: vec![ok.finish(Ok(())), failed],
        };
        assert!(!report.all_passed());
        assert_eq!(report.passed_count(), 1);

        let text = report.to_string();
        assert!(text.contains("✓ PASS source (/dev/ttyUSB0)"));
        assert!(text.contains("925.000 MHz"));
        assert!(text.contains("✗ FAIL analyzer (-)"));
        assert!(text.contains("1/2 instruments OK"));
    }
}
