use std::fmt;

/// Lifecycle of a sweep run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepState {
    /// Nothing opened yet
    #[default]
    Idle,
    /// Opening and configuring instruments
    Connecting,
    /// Measuring a power level
    Sweeping,
    /// Every power level finished
    Complete,
    /// Aborted; partial results were flushed
    Failed,
}

impl SweepState {
    /// True for `Complete` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SweepState::Complete | SweepState::Failed)
    }
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepState::Idle => "idle",
            SweepState::Connecting => "connecting",
            SweepState::Sweeping => "sweeping",
            SweepState::Complete => "complete",
            SweepState::Failed => "failed",
        };
        f.write_str(name)
    }
}
