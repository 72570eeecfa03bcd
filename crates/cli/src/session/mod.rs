//! Session orchestration module.

mod crash;
mod orchestrator;
mod stats;

pub use crash::{run_crash, CrashOutcome};
pub use orchestrator::Session;
pub use stats::SessionStats;
