//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{apply_update, new_job_id, JobFilter, JobStore, JobStoreError};
use super::types::{Job, JobRequest, JobState, JobUpdate};

/// SQLite-backed job store.
///
/// Each record is stored as a JSON document next to indexed `state` and
/// `submitted_at` columns used for listing.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| JobStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                submitted_at TEXT NOT NULL,
                state TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state);
            CREATE INDEX IF NOT EXISTS idx_jobs_submitted_at ON jobs(submitted_at);
            "#,
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection lock poisoned".to_string()))
    }

    fn timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
        // Fixed precision keeps lexical and chronological order identical.
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn decode(data: &str) -> Result<Job, JobStoreError> {
        serde_json::from_str(data).map_err(|e| JobStoreError::Database(e.to_string()))
    }

    fn encode(job: &Job) -> Result<String, JobStoreError> {
        serde_json::to_string(job).map_err(|e| JobStoreError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: JobRequest) -> Result<Job, JobStoreError> {
        let conn = self.lock()?;
        let job = Job::new(new_job_id(), request);

        conn.execute(
            "INSERT INTO jobs (id, submitted_at, state, data, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                job.id,
                Self::timestamp(&job.submitted_at),
                job.state.as_str(),
                Self::encode(&job)?,
                Self::timestamp(&job.updated_at),
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Job, JobStoreError> {
        let conn = self.lock()?;

        let data: Option<String> = conn
            .query_row("SELECT data FROM jobs WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        match data {
            Some(data) => Self::decode(&data),
            None => Err(JobStoreError::NotFound(id.to_string())),
        }
    }

    fn update(&self, id: &str, update: JobUpdate) -> Result<Job, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let data: Option<String> = tx
            .query_row("SELECT data FROM jobs WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        let mut job = match data {
            Some(data) => Self::decode(&data)?,
            None => return Err(JobStoreError::NotFound(id.to_string())),
        };

        apply_update(&mut job, update)?;

        tx.execute(
            "UPDATE jobs SET state = ?, data = ?, updated_at = ? WHERE id = ?",
            params![
                job.state.as_str(),
                Self::encode(&job)?,
                Self::timestamp(&job.updated_at),
                id,
            ],
        )
        .map_err(|e| JobStoreError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| JobStoreError::Database(e.to_string()))?;

        Ok(job)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.lock()?;
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let rows: Vec<String> = match filter.state {
            Some(state) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT data FROM jobs WHERE state = ? ORDER BY submitted_at DESC, rowid DESC LIMIT ?",
                    )
                    .map_err(|e| JobStoreError::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![state.as_str(), limit], |row| row.get(0))
                    .map_err(|e| JobStoreError::Database(e.to_string()))?;
                rows.collect::<Result<_, _>>()
                    .map_err(|e| JobStoreError::Database(e.to_string()))?
            }
            None => {
                let mut stmt = conn
                    .prepare(
                        "SELECT data FROM jobs ORDER BY submitted_at DESC, rowid DESC LIMIT ?",
                    )
                    .map_err(|e| JobStoreError::Database(e.to_string()))?;
                let rows = stmt
                    .query_map(params![limit], |row| row.get(0))
                    .map_err(|e| JobStoreError::Database(e.to_string()))?;
                rows.collect::<Result<_, _>>()
                    .map_err(|e| JobStoreError::Database(e.to_string()))?
            }
        };

        rows.iter().map(|data| Self::decode(data)).collect()
    }

    fn count(&self, state: JobState) -> Result<usize, JobStoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE state = ?",
                params![state.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| JobStoreError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::types::{ErrorKind, FailureDetail, Stage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn request(url: &str) -> JobRequest {
        JobRequest {
            url: url.to_string(),
            language: "yo".to_string(),
            translate: true,
            target_language: "es".to_string(),
            model: "large-v3".to_string(),
            low_precision: true,
        }
    }

    #[test]
    fn test_create_get_round_trip() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(request("https://youtu.be/a")).unwrap();

        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.state, JobState::Queued);
        assert_eq!(fetched.request, job.request);
    }

    #[test]
    fn test_get_missing() {
        let store = SqliteJobStore::in_memory().unwrap();
        assert!(matches!(
            store.get("nope").unwrap_err(),
            JobStoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_update_persists_fields() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(request("https://youtu.be/a")).unwrap();

        store.update(&job.id, JobUpdate::state(JobState::Admitted)).unwrap();
        store
            .update(&job.id, JobUpdate::enter_stage(Stage::Downloading))
            .unwrap();
        store
            .update(
                &job.id,
                JobUpdate::state(JobState::Failed)
                    .with_stage_finished(Stage::Downloading)
                    .with_artifact(PathBuf::from("/tmp/x.mp3"))
                    .with_failure(FailureDetail::fatal(
                        Some(Stage::Downloading),
                        ErrorKind::SizeExceeded,
                        "too big",
                    )),
            )
            .unwrap();

        let fetched = store.get(&job.id).unwrap();
        assert_eq!(fetched.state, JobState::Failed);
        assert_eq!(fetched.failure.unwrap().kind, ErrorKind::SizeExceeded);
        assert_eq!(fetched.artifact_path, Some(PathBuf::from("/tmp/x.mp3")));
        assert!(fetched.finished_at.is_some());
    }

    #[test]
    fn test_invalid_transition_not_persisted() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create(request("https://youtu.be/a")).unwrap();

        let err = store
            .update(&job.id, JobUpdate::state(JobState::Completed))
            .unwrap_err();
        assert!(matches!(err, JobStoreError::InvalidTransition { .. }));
        assert_eq!(store.get(&job.id).unwrap().state, JobState::Queued);
    }

    #[test]
    fn test_list_newest_first_with_filter() {
        let store = SqliteJobStore::in_memory().unwrap();
        let first = store.create(request("https://youtu.be/1")).unwrap();
        let second = store.create(request("https://youtu.be/2")).unwrap();
        store
            .update(&first.id, JobUpdate::state(JobState::Admitted))
            .unwrap();

        let all = store.list(&JobFilter::new()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let queued = store
            .list(&JobFilter::new().with_state(JobState::Queued))
            .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, second.id);

        assert_eq!(store.count(JobState::Admitted).unwrap(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("jobs.db");

        let id = {
            let store = SqliteJobStore::new(&db).unwrap();
            store.create(request("https://youtu.be/a")).unwrap().id
        };

        let store = SqliteJobStore::new(&db).unwrap();
        assert_eq!(store.get(&id).unwrap().state, JobState::Queued);
    }
}
