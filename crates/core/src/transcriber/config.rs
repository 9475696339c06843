//! Configuration for the transcriber module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the whisper.cpp CLI transcriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to the whisper-cli binary.
    #[serde(default = "default_whisper_path")]
    pub whisper_path: PathBuf,

    /// Directory holding `ggml-<model>.bin` files.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

fn default_whisper_path() -> PathBuf {
    PathBuf::from("whisper-cli")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            whisper_path: default_whisper_path(),
            model_dir: default_model_dir(),
        }
    }
}

impl TranscriberConfig {
    /// Path of the weights file for `model`.
    pub fn model_path(&self, model: &str) -> PathBuf {
        self.model_dir.join(format!("ggml-{model}.bin"))
    }

    /// Sets the model directory.
    pub fn with_model_dir(mut self, model_dir: PathBuf) -> Self {
        self.model_dir = model_dir;
        self
    }

    /// Sets the whisper-cli binary path.
    pub fn with_whisper_path(mut self, path: PathBuf) -> Self {
        self.whisper_path = path;
        self
    }
}
