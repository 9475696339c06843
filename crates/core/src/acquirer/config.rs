//! Configuration for the acquirer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the yt-dlp based acquirer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquirerConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Directory downloaded audio is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Audio format passed to `--audio-format`.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Audio quality passed to `--audio-quality` (0 is best).
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "0".to_string()
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            output_dir: default_output_dir(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
        }
    }
}

impl AcquirerConfig {
    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Sets the yt-dlp binary path.
    pub fn with_ytdlp_path(mut self, path: PathBuf) -> Self {
        self.ytdlp_path = path;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AcquirerConfig::default();
        assert_eq!(config.ytdlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.audio_format, "mp3");
        assert_eq!(config.audio_quality, "0");
    }

    #[test]
    fn test_partial_toml() {
        let config: AcquirerConfig = toml::from_str(r#"output_dir = "/var/scribe""#).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/var/scribe"));
        assert_eq!(config.audio_format, "mp3");
    }
}
