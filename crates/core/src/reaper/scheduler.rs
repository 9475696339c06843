//! Scheduling and execution of artifact removals.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::ReaperConfig;
use super::types::{ReaperError, RemovalOutcome, RemovalTrigger, SweepReport};
use crate::job::{JobStore, JobStoreError, JobUpdate};
use crate::metrics;

/// A removal waiting for its timer.
struct PendingRemoval {
    job_id: String,
    handle: JoinHandle<()>,
}

struct Inner {
    config: ReaperConfig,
    store: Option<Arc<dyn JobStore>>,
    /// Timers keyed by path.
    pending: Mutex<HashMap<PathBuf, PendingRemoval>>,
    /// Paths currently being deleted.
    in_flight: Mutex<HashSet<PathBuf>>,
}

/// Removes job-owned artifacts, immediately or after a delay.
///
/// Every removal path goes through [`Reaper::remove`], which claims the path
/// before touching the filesystem, so concurrent triggers delete a file at most
/// once and an already-missing file is never an error. Cheap to clone.
#[derive(Clone)]
pub struct Reaper {
    inner: Arc<Inner>,
}

impl Reaper {
    pub fn new(config: ReaperConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store: None,
                pending: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Clears `artifact_path` on the owning job once its artifact is gone.
    pub fn with_store(config: ReaperConfig, store: Arc<dyn JobStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store: Some(store),
                pending: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.inner.config
    }

    /// Number of removals waiting for their timer.
    pub fn pending(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Removes `path` now.
    pub fn remove(&self, path: &Path) -> Result<RemovalOutcome, ReaperError> {
        self.inner.remove(path, RemovalTrigger::Direct)
    }

    /// Requests removal of a finished job's artifact.
    ///
    /// With no configured delay the file is removed before this returns.
    /// Otherwise a timer is registered; scheduling a path that already has
    /// one is a no-op. Must be called within a tokio runtime when a delay is
    /// configured.
    pub fn schedule(&self, job_id: &str, path: &Path) {
        let delay = self.inner.config.cleanup_delay();
        if delay.is_zero() {
            self.inner.remove_owned(job_id, path, RemovalTrigger::Pipeline);
            return;
        }

        let mut pending = lock(&self.inner.pending);
        if pending.contains_key(path) {
            debug!(job_id = %job_id, path = %path.display(), "Removal already scheduled");
            return;
        }

        let inner = self.inner.clone();
        let task_path = path.to_path_buf();
        let task_job_id = job_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Whoever takes the entry performs the removal.
            if lock(&inner.pending).remove(&task_path).is_none() {
                return;
            }
            inner.remove_owned(&task_job_id, &task_path, RemovalTrigger::Deferred);
        });

        debug!(
            job_id = %job_id,
            path = %path.display(),
            delay_ms = delay.as_millis() as u64,
            "Scheduled artifact removal"
        );
        pending.insert(
            path.to_path_buf(),
            PendingRemoval {
                job_id: job_id.to_string(),
                handle,
            },
        );
    }

    /// Cancels all timers and performs their removals now. Returns how many
    /// removals were flushed.
    pub fn flush(&self) -> usize {
        let drained: Vec<_> = lock(&self.inner.pending).drain().collect();
        let count = drained.len();
        for (path, removal) in drained {
            removal.handle.abort();
            self.inner
                .remove_owned(&removal.job_id, &path, RemovalTrigger::Flush);
        }
        if count > 0 {
            info!(count, "Flushed pending artifact removals");
        }
        count
    }

    /// Cancels all timers without deleting anything; the files are left for
    /// the next sweep. Returns how many removals were dropped.
    pub fn cancel_pending(&self) -> usize {
        let drained: Vec<_> = lock(&self.inner.pending).drain().collect();
        for (_, removal) in &drained {
            removal.handle.abort();
        }
        drained.len()
    }

    /// Removes every managed file directly inside the artifacts directory.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(dir) = self.inner.config.artifacts_dir.as_deref() else {
            debug!("No artifacts directory configured, skipping sweep");
            return report;
        };

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Artifacts directory missing, nothing to sweep");
                return report;
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read artifacts directory");
                return report;
            }
        };

        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let path = entry.path();
            let managed = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.inner.config.manages_extension(e));
            if !managed {
                continue;
            }

            report.scanned += 1;
            match self.inner.remove(&path, RemovalTrigger::Sweep) {
                Ok(RemovalOutcome::Removed) => report.removed += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Sweep failed to remove artifact");
                    report.failed += 1;
                }
            }
        }

        info!(
            dir = %dir.display(),
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Artifact sweep finished"
        );
        report
    }
}

impl Inner {
    fn remove(&self, path: &Path, trigger: RemovalTrigger) -> Result<RemovalOutcome, ReaperError> {
        if !lock(&self.in_flight).insert(path.to_path_buf()) {
            return Ok(RemovalOutcome::InProgress);
        }

        let result = match std::fs::remove_file(path) {
            Ok(()) => {
                metrics::ARTIFACTS_REMOVED
                    .with_label_values(&[trigger.as_str()])
                    .inc();
                debug!(path = %path.display(), trigger = trigger.as_str(), "Removed artifact");
                Ok(RemovalOutcome::Removed)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RemovalOutcome::AlreadyAbsent),
            Err(source) => Err(ReaperError::Io {
                path: path.to_path_buf(),
                source,
            }),
        };

        lock(&self.in_flight).remove(path);
        result
    }

    /// Removes a job's artifact and clears it from the job record.
    fn remove_owned(&self, job_id: &str, path: &Path, trigger: RemovalTrigger) {
        match self.remove(path, trigger) {
            // Whoever holds the claim may not know the job, so clear it here.
            Ok(_) => self.clear_artifact(job_id),
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to remove artifact"),
        }
    }

    fn clear_artifact(&self, job_id: &str) {
        let Some(store) = &self.store else {
            return;
        };
        match store.update(job_id, JobUpdate::clear_artifact()) {
            Ok(_) => {}
            Err(JobStoreError::NotFound(_)) => {
                debug!(job_id = %job_id, "Job gone before artifact was cleared")
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "Failed to clear artifact path"),
        }
    }
}

/// Locks a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobRequest, MemoryJobStore, JobState};
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }

    fn store_with_job(path: &Path) -> (Arc<MemoryJobStore>, String) {
        let store = Arc::new(MemoryJobStore::new());
        let job = store
            .create(JobRequest {
                url: "https://youtu.be/a".to_string(),
                language: "en".to_string(),
                translate: false,
                target_language: "es".to_string(),
                model: "base".to_string(),
                low_precision: false,
            })
            .unwrap();
        store
            .update(
                &job.id,
                JobUpdate::state(JobState::Admitted).with_artifact(path.to_path_buf()),
            )
            .unwrap();
        (store, job.id)
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "a.mp3");
        let reaper = Reaper::new(ReaperConfig::default());

        assert_eq!(reaper.remove(&path).unwrap(), RemovalOutcome::Removed);
        assert_eq!(reaper.remove(&path).unwrap(), RemovalOutcome::AlreadyAbsent);
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_removals_delete_once() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "race.mp3");
        let reaper = Reaper::new(ReaperConfig::default());

        let outcomes: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| reaper.remove(&path).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let removed = outcomes
            .iter()
            .filter(|o| **o == RemovalOutcome::Removed)
            .count();
        assert_eq!(removed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_schedule_without_delay_removes_and_clears_job() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "job.mp3");
        let (store, job_id) = store_with_job(&path);
        let reaper = Reaper::with_store(ReaperConfig::default(), store.clone());

        reaper.schedule(&job_id, &path);

        assert!(!path.exists());
        assert_eq!(reaper.pending(), 0);
        assert!(store.get(&job_id).unwrap().artifact_path.is_none());
    }

    #[test]
    fn test_schedule_clears_job_while_another_removal_holds_path() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "claimed.mp3");
        let (store, job_id) = store_with_job(&path);
        let reaper = Reaper::with_store(ReaperConfig::default(), store.clone());

        lock(&reaper.inner.in_flight).insert(path.clone());
        reaper.schedule(&job_id, &path);
        lock(&reaper.inner.in_flight).remove(&path);

        assert!(store.get(&job_id).unwrap().artifact_path.is_none());
    }

    #[tokio::test]
    async fn test_deferred_removal_fires() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "later.mp3");
        let (store, job_id) = store_with_job(&path);
        let reaper = Reaper::with_store(
            ReaperConfig::default().with_cleanup_delay_ms(20),
            store.clone(),
        );

        reaper.schedule(&job_id, &path);
        reaper.schedule(&job_id, &path);
        assert_eq!(reaper.pending(), 1);
        assert!(path.exists());

        for _ in 0..100 {
            if !path.exists() && reaper.pending() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
        assert_eq!(reaper.pending(), 0);
        assert!(store.get(&job_id).unwrap().artifact_path.is_none());
    }

    #[tokio::test]
    async fn test_flush_removes_now() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "flush.mp3");
        let reaper = Reaper::new(ReaperConfig::default().with_cleanup_delay_ms(60_000));

        reaper.schedule("job-1", &path);
        assert_eq!(reaper.flush(), 1);
        assert!(!path.exists());
        assert_eq!(reaper.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancel_pending_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "keep.mp3");
        let reaper = Reaper::new(ReaperConfig::default().with_cleanup_delay_ms(60_000));

        reaper.schedule("job-1", &path);
        assert_eq!(reaper.cancel_pending(), 1);
        assert!(path.exists());
        assert_eq!(reaper.pending(), 0);
    }

    #[tokio::test]
    async fn test_deferred_after_sweep_does_not_fail() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "swept.mp3");
        let reaper = Reaper::new(
            ReaperConfig::default()
                .with_artifacts_dir(dir.path().to_path_buf())
                .with_cleanup_delay_ms(20),
        );

        reaper.schedule("job-1", &path);
        let report = reaper.sweep();
        assert_eq!(report.removed, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(reaper.pending(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_sweep_only_touches_managed_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp3");
        touch(dir.path(), "b.webm.part");
        touch(dir.path(), "c.M4A");
        let keep = touch(dir.path(), "scribe.db");
        std::fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        let nested = touch(&dir.path().join("nested.mp3"), "inner.mp3");

        let reaper =
            Reaper::new(ReaperConfig::default().with_artifacts_dir(dir.path().to_path_buf()));
        let report = reaper.sweep();

        assert_eq!(
            report,
            SweepReport {
                scanned: 3,
                removed: 3,
                failed: 0
            }
        );
        assert!(keep.exists());
        assert!(nested.exists());
    }

    #[test]
    fn test_sweep_missing_dir() {
        let reaper = Reaper::new(
            ReaperConfig::default().with_artifacts_dir(PathBuf::from("/nonexistent/scribe")),
        );
        assert_eq!(reaper.sweep(), SweepReport::default());
    }
}
