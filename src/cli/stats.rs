use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

#[cfg(feature = "colorized_output")]
use console::style;

use lo_sweep::output::schema::keys;
use lo_sweep::output::{read_parquet_metadata, read_table, SweepStatistics};

fn is_parquet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

fn heading(path: &Path) -> String {
    let text = path.display().to_string();
    #[cfg(feature = "colorized_output")]
    {
        style(text).bold().cyan().to_string()
    }
    #[cfg(not(feature = "colorized_output"))]
    {
        text
    }
}

/// Print statistics for each result file
pub fn run(files: Vec<PathBuf>) -> Result<()> {
    for (i, path) in files.iter().enumerate() {
        if i > 0 {
            println!();
        }
        let records = read_table(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        println!("{}", heading(path));
        if is_parquet(path) {
            let metadata = read_parquet_metadata(path)
                .with_context(|| format!("Failed to read metadata of {}", path.display()))?;
            for key in [keys::RUN_ID, keys::LO_POWER_SETTING, keys::CREATED] {
                if let Some(value) = metadata.get(key) {
                    println!("{}: {}", key, value);
                }
            }
        }
        if let Some(setting) = records.first().map(|r| r.lo_power_setting()) {
            println!("LO power setting: {:+} dBm", setting);
        }
        println!("{}", SweepStatistics::from_records(&records));
    }
    Ok(())
}
