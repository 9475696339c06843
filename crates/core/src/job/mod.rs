//! Job records and the stores that hold them.

mod memory_store;
mod sqlite_store;
mod store;
mod types;

pub use memory_store::MemoryJobStore;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobFilter, JobStore, JobStoreError};
pub use types::{
    ErrorKind, FailureDetail, Job, JobRequest, JobState, JobUpdate, Stage, StageSpan,
    StageTimings,
};
