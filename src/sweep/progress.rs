use std::time::{Duration, Instant};

use log::info;

use crate::record::PointOutcome;

/// Per-point progress logging with rate and ETA
pub(crate) struct Progress {
    total: usize,
    lo_power: i32,
    started: Instant,
}

impl Progress {
    pub(crate) fn start(total: usize, lo_power: i32) -> Self {
        Self {
            total,
            lo_power,
            started: Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log point `index` (0-based) of the pass
    pub(crate) fn point(&self, index: usize, frequency_mhz: f64, outcome: &PointOutcome) {
        let done = index + 1;
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
        let eta = if rate > 0.0 {
            Duration::from_secs_f64(self.total.saturating_sub(done) as f64 / rate)
        } else {
            Duration::ZERO
        };
        let reading = match outcome {
            PointOutcome::Measured(peak) => format!("{:7.2} dBm", peak.power_dbm),
            PointOutcome::Missing { .. } => "    missing".to_string(),
        };
        info!(
            "[{:+} dBm] {:>5}/{} ({:5.1}%) {:10.3} MHz {} | {:.2} pts/s | ETA {}",
            self.lo_power,
            done,
            self.total,
            100.0 * done as f64 / self.total.max(1) as f64,
            frequency_mhz,
            reading,
            rate,
            format_duration(eta)
        );
    }
}

/// `h:mm:ss`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(61)), "0:01:01");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 125)), "3:02:05");
    }
}
