//! Types for the acquirer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Limits a download must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionLimits {
    /// Maximum media duration in seconds.
    pub max_duration_secs: u64,
    /// Maximum artifact size in bytes.
    pub max_size_bytes: u64,
}

impl AcquisitionLimits {
    pub fn new(max_duration_secs: u64, max_size_bytes: u64) -> Self {
        Self {
            max_duration_secs,
            max_size_bytes,
        }
    }

    /// Whether a reported duration is over the limit.
    pub fn duration_exceeded(&self, duration_secs: f64) -> bool {
        duration_secs > self.max_duration_secs as f64
    }

    /// Whether a size is over the limit.
    pub fn size_exceeded(&self, size_bytes: u64) -> bool {
        size_bytes > self.max_size_bytes
    }
}

/// An audio file produced by an acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Location of the audio file.
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// Media duration as reported by the source, if known.
    pub duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits() {
        let limits = AcquisitionLimits::new(7200, 500 * 1024 * 1024);
        assert!(!limits.duration_exceeded(7200.0));
        assert!(limits.duration_exceeded(7200.5));
        assert!(!limits.size_exceeded(500 * 1024 * 1024));
        assert!(limits.size_exceeded(500 * 1024 * 1024 + 1));
    }
}
