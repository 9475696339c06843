//! Mock transcriber for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::transcriber::{CancelFlag, Transcriber, Transcript, TranscriptionError, TranscriptionRequest};

/// Mock implementation of the Transcriber trait.
///
/// Blocking like the real thing. A missing artifact yields `NotFound`, so tests
/// also catch artifacts that were removed too early.
#[derive(Debug)]
pub struct MockTranscriber {
    requests: Mutex<Vec<TranscriptionRequest>>,
    call_count: AtomicUsize,
    working: AtomicUsize,
    cancelled: AtomicUsize,
    transcript: Mutex<Transcript>,
    next_error: Mutex<Option<TranscriptionError>>,
    /// Simulated work time; cancellation is honoured while "working".
    duration: Mutex<Duration>,
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            working: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            transcript: Mutex::new(
                Transcript::new("transcribed text").with_detected_language("en", 0.99),
            ),
            next_error: Mutex::new(None),
            duration: Mutex::new(Duration::ZERO),
        }
    }

    /// Number of transcriptions attempted.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls that got past validation and started simulated work.
    pub fn working_count(&self) -> usize {
        self.working.load(Ordering::SeqCst)
    }

    /// Calls that observed the cancel flag and stopped early.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<TranscriptionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Set the transcript returned on success.
    pub fn set_transcript(&self, transcript: Transcript) {
        if let Ok(mut t) = self.transcript.lock() {
            *t = transcript;
        }
    }

    /// Configure the next call to fail with `error`.
    pub fn set_next_error(&self, error: TranscriptionError) {
        if let Ok(mut e) = self.next_error.lock() {
            *e = Some(error);
        }
    }

    /// Set the simulated work time.
    pub fn set_duration(&self, duration: Duration) {
        if let Ok(mut d) = self.duration.lock() {
            *d = duration;
        }
    }
}

impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    fn transcribe(
        &self,
        request: &TranscriptionRequest,
        cancel: &CancelFlag,
    ) -> Result<Transcript, TranscriptionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(err) = self.next_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(err);
        }

        if !request.artifact_path.exists() {
            return Err(TranscriptionError::NotFound {
                path: request.artifact_path.clone(),
            });
        }

        let duration = self.duration.lock().map(|d| *d).unwrap_or_default();
        self.working.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(TranscriptionError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        self.transcript
            .lock()
            .map(|t| t.clone())
            .map_err(|_| TranscriptionError::model_error("mock poisoned", None))
    }
}
