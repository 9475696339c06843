//! whisper.cpp CLI transcriber implementation.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::config::TranscriberConfig;
use super::error::TranscriptionError;
use super::traits::Transcriber;
use super::types::{CancelFlag, Transcript, TranscriptionRequest, SUPPORTED_EXTENSIONS};

static DETECTED_LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"auto-detected language:\s*([A-Za-z-]+)\s*\(p\s*=\s*([0-9]*\.?[0-9]+)\)").unwrap()
});

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Transcriber that runs the whisper.cpp command line tool.
pub struct WhisperCliTranscriber {
    config: TranscriberConfig,
}

impl WhisperCliTranscriber {
    /// Creates a new transcriber with the given configuration.
    pub fn new(config: TranscriberConfig) -> Self {
        Self { config }
    }

    /// Creates a transcriber with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscriberConfig::default())
    }

    /// Checks the request before spawning anything.
    fn preflight(&self, request: &TranscriptionRequest) -> Result<PathBuf, TranscriptionError> {
        if !request.artifact_path.is_file() {
            return Err(TranscriptionError::NotFound {
                path: request.artifact_path.clone(),
            });
        }

        let extension = request.extension().unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(TranscriptionError::UnsupportedFormat {
                format: if extension.is_empty() {
                    "unknown".to_string()
                } else {
                    extension
                },
            });
        }

        let model_path = self.config.model_path(&request.model);
        if !model_path.is_file() {
            return Err(TranscriptionError::model_error(
                format!("model file not found: {}", model_path.display()),
                None,
            ));
        }

        Ok(model_path)
    }

    /// Output prefix whisper-cli writes `<prefix>.txt` to.
    fn output_prefix(artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        artifact.with_file_name(format!("{stem}.transcript"))
    }

    fn build_args(request: &TranscriptionRequest, model_path: &Path, prefix: &Path) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            model_path.to_string_lossy().to_string(),
            "-f".to_string(),
            request.artifact_path.to_string_lossy().to_string(),
            "-otxt".to_string(),
            "-of".to_string(),
            prefix.to_string_lossy().to_string(),
            "-np".to_string(),
        ];

        if let Some(language) = request.language.as_deref() {
            if !language.is_empty() {
                args.extend(["-l".to_string(), language.to_string()]);
            }
        }

        if !request.low_precision {
            args.push("-ng".to_string());
        }

        args
    }

    /// Joins transcript lines into a single paragraph.
    fn normalize_text(raw: &str) -> String {
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_detected_language(stderr: &str) -> Option<(String, f32)> {
        let caps = DETECTED_LANGUAGE.captures(stderr)?;
        let language = caps.get(1)?.as_str().to_string();
        let confidence = caps.get(2)?.as_str().parse::<f32>().ok()?;
        Some((language, confidence))
    }

    /// Runs the child process, killing it if `cancel` is raised.
    fn run(
        &self,
        args: &[String],
        cancel: &CancelFlag,
    ) -> Result<(std::process::ExitStatus, String), TranscriptionError> {
        let mut child = Command::new(&self.config.whisper_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscriptionError::ToolNotFound {
                        path: self.config.whisper_path.clone(),
                    }
                } else {
                    TranscriptionError::Io(e)
                }
            })?;

        // Drain stderr on its own thread so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TranscriptionError::Cancelled);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok((status, stderr))
    }
}

impl Transcriber for WhisperCliTranscriber {
    fn name(&self) -> &str {
        "whisper-cli"
    }

    fn transcribe(
        &self,
        request: &TranscriptionRequest,
        cancel: &CancelFlag,
    ) -> Result<Transcript, TranscriptionError> {
        let model_path = self.preflight(request)?;
        let prefix = Self::output_prefix(&request.artifact_path);
        let mut output_path = prefix.clone().into_os_string();
        output_path.push(".txt");
        let output_path = PathBuf::from(output_path);
        let args = Self::build_args(request, &model_path, &prefix);

        info!(
            job_id = %request.job_id,
            model = %request.model,
            language = ?request.language,
            low_precision = request.low_precision,
            "Transcribing"
        );
        debug!(job_id = %request.job_id, args = ?args, "Running whisper-cli");

        let start = Instant::now();
        let (status, stderr) = self.run(&args, cancel)?;

        if !status.success() {
            let _ = std::fs::remove_file(&output_path);
            return Err(TranscriptionError::model_error(
                format!("whisper-cli exited with code: {:?}", status.code()),
                Some(stderr.trim().to_string()).filter(|s| !s.is_empty()),
            ));
        }

        let raw = std::fs::read_to_string(&output_path).map_err(|e| {
            TranscriptionError::model_error(
                format!("transcript not written to {}: {e}", output_path.display()),
                None,
            )
        })?;
        if let Err(e) = std::fs::remove_file(&output_path) {
            warn!(path = %output_path.display(), error = %e, "Failed to remove transcript file");
        }

        let mut transcript = Transcript::new(Self::normalize_text(&raw));
        if let Some((language, confidence)) = Self::parse_detected_language(&stderr) {
            info!(
                job_id = %request.job_id,
                detected_language = %language,
                confidence,
                "Detected language"
            );
            transcript = transcript.with_detected_language(language, confidence);
        }

        info!(
            job_id = %request.job_id,
            chars = transcript.text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transcription completed"
        );

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(path: PathBuf) -> TranscriptionRequest {
        TranscriptionRequest {
            job_id: "job-1".to_string(),
            artifact_path: path,
            language: Some("yo".to_string()),
            model: "base".to_string(),
            low_precision: false,
        }
    }

    #[test]
    fn test_missing_artifact_is_not_found() {
        let transcriber = WhisperCliTranscriber::with_defaults();
        let err = transcriber
            .transcribe(&request(PathBuf::from("/nonexistent/a.mp3")), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::NotFound { .. }));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let transcriber = WhisperCliTranscriber::with_defaults();
        let err = transcriber
            .transcribe(&request(path), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::UnsupportedFormat { format } if format == "txt"));
    }

    #[test]
    fn test_missing_model_is_model_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audio.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let transcriber = WhisperCliTranscriber::new(
            TranscriberConfig::default().with_model_dir(dir.path().join("models")),
        );
        let err = transcriber
            .transcribe(&request(path), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::ModelError { .. }));
    }

    #[test]
    fn test_missing_binary_is_tool_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/ggml-base.bin"), b"weights").unwrap();

        let transcriber = WhisperCliTranscriber::new(
            TranscriberConfig::default()
                .with_model_dir(dir.path().join("models"))
                .with_whisper_path(PathBuf::from("/nonexistent/whisper-cli")),
        );
        let err = transcriber
            .transcribe(&request(path), &CancelFlag::new())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::ToolNotFound { .. }));
    }

    #[test]
    fn test_build_args() {
        let req = request(PathBuf::from("/dl/audio_1.mp3"));
        let prefix = WhisperCliTranscriber::output_prefix(&req.artifact_path);
        assert_eq!(prefix, PathBuf::from("/dl/audio_1.transcript"));

        let args =
            WhisperCliTranscriber::build_args(&req, Path::new("/models/ggml-base.bin"), &prefix);
        assert_eq!(&args[0..2], &["-m", "/models/ggml-base.bin"]);
        assert!(args.contains(&"-otxt".to_string()));
        assert!(args.windows(2).any(|w| w == ["-l", "yo"]));
        assert!(args.contains(&"-ng".to_string()));

        let mut accelerated = req.clone();
        accelerated.low_precision = true;
        accelerated.language = None;
        let args = WhisperCliTranscriber::build_args(
            &accelerated,
            Path::new("/models/ggml-base.bin"),
            &prefix,
        );
        assert!(!args.contains(&"-ng".to_string()));
        assert!(!args.contains(&"-l".to_string()));
    }

    #[test]
    fn test_normalize_text() {
        let raw = " Ẹ kú àárọ̀.\n\n  How are you?  \n";
        assert_eq!(
            WhisperCliTranscriber::normalize_text(raw),
            "Ẹ kú àárọ̀. How are you?"
        );
    }

    #[test]
    fn test_parse_detected_language() {
        let stderr = "whisper_full_with_state: auto-detected language: yo (p = 0.873412)\n";
        let (language, confidence) =
            WhisperCliTranscriber::parse_detected_language(stderr).unwrap();
        assert_eq!(language, "yo");
        assert!((confidence - 0.873412).abs() < 1e-5);

        assert!(WhisperCliTranscriber::parse_detected_language("no info").is_none());
    }
}
