//! Resource reaper: idempotent removal of job-owned artifacts.

mod config;
mod scheduler;
mod types;

pub use config::ReaperConfig;
pub use scheduler::Reaper;
pub use types::{ReaperError, RemovalOutcome, RemovalTrigger, SweepReport};
