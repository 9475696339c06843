//! Mock acquirer for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use crate::acquirer::{AcquisitionError, AcquisitionLimits, Acquirer, Artifact};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFetch {
    pub job_id: String,
    pub url: String,
    pub limits: AcquisitionLimits,
}

/// Mock implementation of the Acquirer trait.
///
/// Writes a real file into its output directory so the rest of the pipeline
/// (transcription, cleanup) sees an actual artifact. Fetches can be held at a
/// gate until [`MockAcquirer::release`] is called, which makes concurrency
/// observable in tests.
///
/// # Example
///
/// ```rust,ignore
/// let acquirer = MockAcquirer::new(dir.path());
/// acquirer.hold();
/// // submit jobs...
/// acquirer.wait_for_in_flight(2).await;
/// acquirer.release();
/// ```
#[derive(Debug)]
pub struct MockAcquirer {
    output_dir: PathBuf,
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    next_error: Arc<RwLock<Option<AcquisitionError>>>,
    reported_duration: Arc<RwLock<Option<f64>>>,
    file_size: Arc<RwLock<usize>>,
    delay: Arc<RwLock<Option<Duration>>>,
    gate: watch::Sender<bool>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    produced: AtomicUsize,
}

impl MockAcquirer {
    /// Create a mock acquirer writing artifacts to `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            fetches: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            reported_duration: Arc::new(RwLock::new(Some(180.0))),
            file_size: Arc::new(RwLock::new(1024)),
            delay: Arc::new(RwLock::new(None)),
            gate,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            produced: AtomicUsize::new(0),
        }
    }

    /// Block new and pending fetches until [`MockAcquirer::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held fetches continue.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Fetches currently inside `fetch`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous fetches observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` fetches are in flight.
    pub async fn wait_for_in_flight(&self, count: usize) {
        while self.in_flight() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Number of fetches started.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: AcquisitionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Duration reported on produced artifacts.
    pub async fn set_reported_duration(&self, duration_secs: Option<f64>) {
        *self.reported_duration.write().await = duration_secs;
    }

    /// Size of the files written.
    pub async fn set_file_size(&self, size: usize) {
        *self.file_size.write().await = size;
    }

    /// Simulated download time.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }
}

/// Decrements the in-flight counter however `fetch` exits.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Acquirer for MockAcquirer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        job_id: &str,
        url: &str,
        limits: AcquisitionLimits,
    ) -> Result<Artifact, AcquisitionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        self.fetches.write().await.push(RecordedFetch {
            job_id: job_id.to_string(),
            url: url.to_string(),
            limits,
        });

        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only fails if we are dropped.
        let _ = gate.wait_for(|open| *open).await;

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let n = self.produced.fetch_add(1, Ordering::SeqCst);
        let path = self.output_dir.join(format!("audio_mock_{n}_{job_id}.mp3"));
        let size = *self.file_size.read().await;
        tokio::fs::write(&path, vec![0u8; size]).await?;

        Ok(Artifact {
            path,
            size_bytes: size as u64,
            duration_secs: *self.reported_duration.read().await,
        })
    }
}
