use anyhow::{Context, Result};

use lo_sweep::device::{analyzer_candidates, list_ports, source_candidates, PortKind};

/// List serial ports with their classification
pub fn run() -> Result<()> {
    let ports = list_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("Serial Ports");
    println!("============");
    for port in &ports {
        let tag = match port.kind {
            PortKind::TinySa => "analyzer",
            PortKind::ArduinoLike => "source?",
            PortKind::Other => "",
        };
        println!("  {:<20} {:<10} {}", port.name, tag, port.description());
    }
    println!();

    let sources = source_candidates(&ports);
    let analyzers = analyzer_candidates(&ports);
    println!(
        "Auto-detect would probe the source on: {}",
        if sources.is_empty() { "-".to_string() } else { sources.join(", ") }
    );
    println!(
        "Auto-detect would probe the analyzer on: {}",
        if analyzers.is_empty() { "-".to_string() } else { analyzers.join(", ") }
    );

    Ok(())
}
