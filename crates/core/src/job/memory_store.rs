//! In-memory job store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::store::{apply_update, new_job_id, JobFilter, JobStore, JobStoreError};
use super::types::{Job, JobRequest, JobState, JobUpdate};

/// Job store backed by a `HashMap`. Records live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Job>>, JobStoreError> {
        self.jobs
            .read()
            .map_err(|_| JobStoreError::Database("job map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Job>>, JobStoreError> {
        self.jobs
            .write()
            .map_err(|_| JobStoreError::Database("job map lock poisoned".to_string()))
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, request: JobRequest) -> Result<Job, JobStoreError> {
        let job = Job::new(new_job_id(), request);
        self.write()?.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Job, JobStoreError> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))
    }

    fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobStoreError> {
        let mut jobs = self.write()?;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;
        apply_update(job, update)?;
        Ok(job.clone())
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.read()?;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| filter.state.is_none_or(|s| j.state == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        matching.truncate(filter.limit);
        Ok(matching)
    }

    fn count(&self, state: JobState) -> Result<usize, JobStoreError> {
        Ok(self.read()?.values().filter(|j| j.state == state).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::types::{ErrorKind, FailureDetail, Stage};

    fn request() -> JobRequest {
        JobRequest {
            url: "https://youtu.be/xyz".to_string(),
            language: "en".to_string(),
            translate: false,
            target_language: "es".to_string(),
            model: "tiny".to_string(),
            low_precision: false,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = MemoryJobStore::new();
        let job = store.create(request()).unwrap();
        assert_eq!(job.state, JobState::Queued);

        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched, job);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(matches!(err, JobStoreError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn test_update_rejects_regression() {
        let store = MemoryJobStore::new();
        let job = store.create(request()).unwrap();
        store.update(&job.id, JobUpdate::state(JobState::Admitted)).unwrap();

        let err = store
            .update(&job.id, JobUpdate::state(JobState::Queued))
            .unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition { .. }));
        assert_eq!(store.get(&job.id).unwrap().state, JobState::Admitted);
    }

    #[test]
    fn test_terminal_state_set_once() {
        let store = MemoryJobStore::new();
        let job = store.create(request()).unwrap();
        store
            .update(
                &job.id,
                JobUpdate::state(JobState::Failed).with_failure(FailureDetail::fatal(
                    Some(Stage::Downloading),
                    ErrorKind::Timeout,
                    "timed out",
                )),
            )
            .unwrap();

        let err = store
            .update(&job.id, JobUpdate::state(JobState::Failed))
            .unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_list_and_count() {
        let store = MemoryJobStore::new();
        let a = store.create(request()).unwrap();
        let _b = store.create(request()).unwrap();
        store.update(&a.id, JobUpdate::state(JobState::Admitted)).unwrap();

        assert_eq!(store.count(JobState::Queued).unwrap(), 1);
        assert_eq!(store.count(JobState::Admitted).unwrap(), 1);

        let all = store.list(&JobFilter::new()).unwrap();
        assert_eq!(all.len(), 2);

        let admitted = store
            .list(&JobFilter::new().with_state(JobState::Admitted))
            .unwrap();
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].id, a.id);

        let limited = store.list(&JobFilter::new().with_limit(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
