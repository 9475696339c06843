//! Types for the reaper module.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::job::ErrorKind;

/// Errors from removing an artifact.
#[derive(Debug, Error)]
pub enum ReaperError {
    #[error("Failed to remove {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReaperError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// What a removal request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// The file was deleted by this call.
    Removed,
    /// Nothing was there.
    AlreadyAbsent,
    /// Another trigger is deleting the same path right now.
    InProgress,
}

/// What asked for a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalTrigger {
    /// End of a job's pipeline.
    Pipeline,
    /// A delayed removal whose timer fired.
    Deferred,
    /// A delayed removal forced by `flush`.
    Flush,
    /// Startup or shutdown directory sweep.
    Sweep,
    /// A direct `remove` call.
    Direct,
}

impl RemovalTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalTrigger::Pipeline => "pipeline",
            RemovalTrigger::Deferred => "deferred",
            RemovalTrigger::Flush => "flush",
            RemovalTrigger::Sweep => "sweep",
            RemovalTrigger::Direct => "direct",
        }
    }
}

/// Result of a directory sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Managed files found.
    pub scanned: usize,
    /// Files deleted.
    pub removed: usize,
    /// Files that could not be deleted.
    pub failed: usize,
}
