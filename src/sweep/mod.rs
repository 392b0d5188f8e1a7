//! # Sweep Orchestration
//!
//! [`SweepOrchestrator`] owns the plan and both instruments and runs the
//! measurement loop:
//!
//! 1. set the LO power (fatal if it cannot be set)
//! 2. for every frequency: tune the source, wait for settling, measure the
//!    peak, append a record
//! 3. flush the table and move on to the next power level
//!
//! A point that cannot be measured is retried, then recorded as missing; one
//! bad point never aborts a sweep. Losing a serial link, a source that stops
//! answering, or cancellation end the run in [`SweepState::Failed`] with the
//! points collected so far flushed to disk.
//!
//! [`ToneSweep`] drives the source alone, for watching the LO move on an
//! analyzer display.

mod cancel;
mod error;
mod orchestrator;
mod progress;
mod report;
mod retry;
mod state;
mod tune;


pub use cancel::CancelToken;
pub use error::SweepError;
pub use orchestrator::SweepOrchestrator;
pub use progress::format_duration;
pub use report::{PassSummary, PointFailure, SweepReport};
pub use retry::RetryPolicy;
pub use state::SweepState;
pub use tune::{ToneSweep, ToneSweepReport, DEFAULT_DWELL};
