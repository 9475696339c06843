//! yt-dlp based acquirer implementation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::AcquirerConfig;
use super::error::AcquisitionError;
use super::traits::Acquirer;
use super::types::{AcquisitionLimits, Artifact};

static NO_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)no space left on device").unwrap());

static TOO_LARGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(larger than max-filesize|file is larger than)").unwrap()
});

/// Metadata reported by `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct ProbeInfo {
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    filesize: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
}

impl ProbeInfo {
    fn size_bytes(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|s| *s > 0.0)
            .map(|s| s as u64)
    }
}

/// Acquirer that shells out to yt-dlp and extracts audio.
pub struct YtDlpAcquirer {
    config: AcquirerConfig,
}

impl YtDlpAcquirer {
    /// Creates a new acquirer with the given configuration.
    pub fn new(config: AcquirerConfig) -> Self {
        Self { config }
    }

    /// Creates an acquirer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(AcquirerConfig::default())
    }

    fn validate_url(url: &str) -> Result<(), AcquisitionError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AcquisitionError::invalid_url(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AcquisitionError::invalid_url(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(())
    }

    /// Unique file stem for a new download.
    fn file_stem() -> String {
        format!(
            "audio_{}_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            uuid::Uuid::new_v4()
        )
    }

    fn build_probe_args(url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            url.to_string(),
        ]
    }

    fn build_download_args(&self, url: &str, stem: &str, limits: &AcquisitionLimits) -> Vec<String> {
        let template = self.config.output_dir.join(format!("{stem}.%(ext)s"));
        vec![
            "-x".to_string(),
            format!("--audio-format={}", self.config.audio_format),
            format!("--audio-quality={}", self.config.audio_quality),
            format!("--max-filesize={}", limits.max_size_bytes),
            "--no-playlist".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            url.to_string(),
        ]
    }

    /// Maps a failed yt-dlp run to an error using its stderr.
    fn classify_failure(
        code: Option<i32>,
        stderr: &str,
        limits: &AcquisitionLimits,
    ) -> AcquisitionError {
        if NO_SPACE.is_match(stderr) {
            return AcquisitionError::InsufficientSpace {
                message: last_line(stderr),
            };
        }
        if TOO_LARGE.is_match(stderr) {
            return AcquisitionError::SizeExceeded {
                size_bytes: limits.max_size_bytes.saturating_add(1),
                max_bytes: limits.max_size_bytes,
            };
        }
        let stderr = stderr.trim();
        AcquisitionError::process_failure(
            format!("yt-dlp exited with code: {:?}", code),
            if stderr.is_empty() {
                None
            } else {
                Some(stderr.to_string())
            },
        )
    }

    fn spawn_error(&self, e: std::io::Error) -> AcquisitionError {
        if e.kind() == std::io::ErrorKind::NotFound {
            AcquisitionError::ToolNotFound {
                path: self.config.ytdlp_path.clone(),
            }
        } else {
            AcquisitionError::Io(e)
        }
    }

    /// Reads metadata without downloading and enforces the limits up front.
    async fn probe(&self, url: &str, limits: &AcquisitionLimits) -> Result<ProbeInfo, AcquisitionError> {
        let output = Command::new(&self.config.ytdlp_path)
            .args(Self::build_probe_args(url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Self::classify_failure(output.status.code(), &stderr, limits));
        }

        let info: ProbeInfo = serde_json::from_slice(&output.stdout).map_err(|e| {
            AcquisitionError::process_failure(format!("unreadable metadata: {e}"), None)
        })?;

        if let Some(duration) = info.duration {
            if limits.duration_exceeded(duration) {
                return Err(AcquisitionError::DurationExceeded {
                    duration_secs: duration,
                    max_secs: limits.max_duration_secs,
                });
            }
        }
        if let Some(size) = info.size_bytes() {
            if limits.size_exceeded(size) {
                return Err(AcquisitionError::SizeExceeded {
                    size_bytes: size,
                    max_bytes: limits.max_size_bytes,
                });
            }
        }

        Ok(info)
    }

    /// Finds the file yt-dlp produced for `stem`.
    async fn locate_output(&self, stem: &str) -> Option<PathBuf> {
        let expected = self
            .config
            .output_dir
            .join(format!("{stem}.{}", self.config.audio_format));
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Some(expected);
        }

        // Post-processing may have picked another container.
        let mut entries = tokio::fs::read_dir(&self.config.output_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(stem) && !name.ends_with(".part") {
                return Some(entry.path());
            }
        }
        None
    }

    /// Removes every file left behind for `stem`.
    async fn download(
        &self,
        job_id: &str,
        url: &str,
        stem: &str,
        limits: &AcquisitionLimits,
        duration_secs: Option<f64>,
    ) -> Result<Artifact, AcquisitionError> {
        let args = self.build_download_args(url, stem, limits);
        debug!(job_id = %job_id, args = ?args, "Running yt-dlp");

        let output = Command::new(&self.config.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(output.status.code(), &stderr, limits));
        }

        let path = self.locate_output(stem).await.ok_or_else(|| {
            AcquisitionError::process_failure("yt-dlp reported success but produced no file", None)
        })?;

        let size_bytes = tokio::fs::metadata(&path).await?.len();
        if limits.size_exceeded(size_bytes) {
            return Err(AcquisitionError::SizeExceeded {
                size_bytes,
                max_bytes: limits.max_size_bytes,
            });
        }

        Ok(Artifact {
            path,
            size_bytes,
            duration_secs,
        })
    }
}

/// Files of one download, deleted on drop while armed.
struct PartialDownload {
    dir: PathBuf,
    stem: String,
    armed: bool,
}

impl PartialDownload {
    fn new(dir: &Path, stem: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if self.armed {
            remove_partials(&self.dir, &self.stem);
        }
    }
}

/// Deletes every file in `dir` whose name starts with `stem`.
fn remove_partials(dir: &Path, stem: &str) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(stem) {
            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed partial download"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
            }
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl Acquirer for YtDlpAcquirer {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        job_id: &str,
        url: &str,
        limits: AcquisitionLimits,
    ) -> Result<Artifact, AcquisitionError> {
        Self::validate_url(url)?;
        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        let info = self.probe(url, &limits).await?;
        let stem = Self::file_stem();
        info!(
            job_id = %job_id,
            url = %url,
            duration_secs = ?info.duration,
            "Starting download"
        );

        // Removes whatever yt-dlp left behind unless the download succeeds,
        // including when this future is dropped mid-download.
        let mut partials = PartialDownload::new(&self.config.output_dir, &stem);
        let artifact = self.download(job_id, url, &stem, &limits, info.duration).await?;
        partials.disarm();

        info!(
            job_id = %job_id,
            path = %artifact.path.display(),
            size_mb = artifact.size_bytes as f64 / (1024.0 * 1024.0),
            "Download completed"
        );
        Ok(artifact)
    }
}
