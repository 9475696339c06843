//! Configuration for the reaper module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for artifact cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Directory swept at startup/shutdown. Defaults to the acquirer output directory.
    #[serde(default)]
    pub artifacts_dir: Option<PathBuf>,

    /// File extensions (without dot) the sweep may remove.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Delay before removing a finished job's artifact.
    #[serde(default)]
    pub cleanup_delay_ms: u64,

    /// Sweep the artifacts directory at startup.
    #[serde(default = "default_true")]
    pub sweep_on_startup: bool,

    /// Sweep the artifacts directory at shutdown.
    #[serde(default = "default_true")]
    pub sweep_on_shutdown: bool,
}

fn default_extensions() -> Vec<String> {
    ["mp3", "m4a", "wav", "webm", "opus", "part"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: None,
            extensions: default_extensions(),
            cleanup_delay_ms: 0,
            sweep_on_startup: true,
            sweep_on_shutdown: true,
        }
    }
}

impl ReaperConfig {
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    /// Whether `extension` is managed (case-insensitive).
    pub fn manages_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    pub fn with_artifacts_dir(mut self, dir: PathBuf) -> Self {
        self.artifacts_dir = Some(dir);
        self
    }

    pub fn with_cleanup_delay_ms(mut self, delay_ms: u64) -> Self {
        self.cleanup_delay_ms = delay_ms;
        self
    }
}
