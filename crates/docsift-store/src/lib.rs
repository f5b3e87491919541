//! Docsift Storage Layer
//!
//! Implements the `JobStore` trait on SQLite.
//!
//! # Architecture
//!
//! - One `jobs` table holding lifecycle state and, on completion, the
//!   serialized aggregate result
//! - Lifecycle transitions are validated against the domain state machine
//!   inside the same critical section that writes them, so concurrent
//!   transition attempts on one job id are strictly serialized
//!
//! # Thread Safety
//!
//! The connection is guarded by a single mutex; the store can be shared
//! across tasks behind an `Arc`.
//!
//! # Examples
//!
//! ```
//! use docsift_store::SqliteJobStore;
//! use docsift_domain::JobStore;
//!
//! let store = SqliteJobStore::in_memory().unwrap();
//! let job = store.create("https://example.com/doc", None).unwrap();
//! assert_eq!(store.get(job.id).unwrap().id, job.id);
//! ```

#![warn(missing_docs)]

use docsift_domain::{
    AggregateResult, Job, JobId, JobStatus, JobStore, JobStoreError, WebhookConfig,
};
use docsift_domain::job::unix_now;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-based implementation of `JobStore`
///
/// Jobs are the only rows; results and webhook registrations are stored as
/// JSON columns. Use [`SqliteJobStore::in_memory`] for tests.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) a job store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory job store (useful for testing)
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), JobStoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                input_ref TEXT NOT NULL,
                webhook_config TEXT,
                result TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);",
        )
        .map_err(backend)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Backend("store lock poisoned".to_string()))
    }
}

/// Read one job row; the caller must hold the connection lock
fn read_job(conn: &Connection, id: JobId) -> Result<Job, JobStoreError> {
    let row: Option<(String, i64, i64, String, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT status, created_at, updated_at, input_ref, webhook_config, result
             FROM jobs WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()
        .map_err(backend)?;

    let (status, created_at, updated_at, input_ref, webhook_json, result_json) =
        row.ok_or(JobStoreError::NotFound(id))?;

    let status = JobStatus::parse(&status).map_err(JobStoreError::InvalidData)?;
    let webhook_config: Option<WebhookConfig> = webhook_json
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| JobStoreError::InvalidData(format!("webhook_config: {}", e)))?;
    let result: Option<AggregateResult> = result_json
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| JobStoreError::InvalidData(format!("result: {}", e)))?;

    Ok(Job {
        id,
        status,
        created_at: created_at as u64,
        updated_at: updated_at as u64,
        input_ref,
        webhook_config,
        result,
    })
}

fn backend(error: rusqlite::Error) -> JobStoreError {
    JobStoreError::Backend(error.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JobStoreError> {
    serde_json::to_string(value).map_err(|e| JobStoreError::InvalidData(e.to_string()))
}

impl JobStore for SqliteJobStore {
    fn create(
        &self,
        input_ref: &str,
        webhook_config: Option<WebhookConfig>,
    ) -> Result<Job, JobStoreError> {
        let job = Job::new(input_ref, webhook_config);
        let webhook_json = job
            .webhook_config
            .as_ref()
            .map(to_json)
            .transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO jobs (id, status, created_at, updated_at, input_ref, webhook_config, result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                job.id.to_string(),
                job.status.as_str(),
                job.created_at as i64,
                job.updated_at as i64,
                job.input_ref,
                webhook_json,
            ],
        )
        .map_err(backend)?;

        debug!("Created job {} for '{}'", job.id, job.input_ref);
        Ok(job)
    }

    fn get(&self, id: JobId) -> Result<Job, JobStoreError> {
        let conn = self.lock()?;
        read_job(&conn, id)
    }

    fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        result: Option<AggregateResult>,
    ) -> Result<Job, JobStoreError> {
        // Read-validate-write under one lock hold: concurrent transition
        // attempts on the same id are serialized here
        let conn = self.lock()?;
        let mut job = read_job(&conn, id)?;

        if !job.status.can_transition_to(status) {
            return Err(JobStoreError::InvalidTransition {
                from: job.status,
                to: status,
            });
        }

        let result_json = result.as_ref().map(to_json).transpose()?;
        let updated_at = unix_now();
        conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2,
             result = COALESCE(?3, result) WHERE id = ?4",
            params![status.as_str(), updated_at as i64, result_json, id.to_string()],
        )
        .map_err(backend)?;

        debug!("Job {} transitioned {} -> {}", id, job.status, status);
        job.status = status;
        job.updated_at = updated_at;
        if result.is_some() {
            job.result = result;
        }
        Ok(job)
    }

    fn cancel(&self, id: JobId) -> Result<Job, JobStoreError> {
        let conn = self.lock()?;
        let mut job = read_job(&conn, id)?;

        if job.status.is_terminal() {
            return Err(JobStoreError::AlreadyTerminal(job.status));
        }

        let updated_at = unix_now();
        conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![JobStatus::Cancelled.as_str(), updated_at as i64, id.to_string()],
        )
        .map_err(backend)?;

        debug!("Job {} cancelled (was {})", id, job.status);
        job.status = JobStatus::Cancelled;
        job.updated_at = updated_at;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_domain::{ChunkResult, TokenUsage};
    use serde_json::json;

    fn aggregate() -> AggregateResult {
        AggregateResult::from_chunks(vec![ChunkResult::success(
            0,
            json!({"title": "Doc"}),
            Some(TokenUsage::reported(100, 20)),
            1,
        )])
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let store = SqliteJobStore::in_memory().unwrap();
        let webhook = WebhookConfig::new("https://callback.example.com")
            .with_secret("s3cret")
            .with_max_retries(5);

        let job = store.create("https://example.com/doc", Some(webhook.clone())).unwrap();
        let fetched = store.get(job.id).unwrap();

        assert_eq!(fetched, job);
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.webhook_config, Some(webhook));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = SqliteJobStore::in_memory().unwrap();
        let id = JobId::new();
        assert_eq!(store.get(id).unwrap_err(), JobStoreError::NotFound(id));
    }

    #[test]
    fn test_full_lifecycle_with_result() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create("https://example.com/doc", None).unwrap();

        store.transition(job.id, JobStatus::Running, None).unwrap();
        let done = store
            .transition(job.id, JobStatus::Completed, Some(aggregate()))
            .unwrap();

        assert_eq!(done.status, JobStatus::Completed);

        let fetched = store.get(job.id).unwrap();
        assert_eq!(fetched.status, JobStatus::Completed);
        let result = fetched.result.unwrap();
        assert_eq!(result.usage.total_tokens, 120);
        assert_eq!(result.chunks.len(), 1);
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[test]
    fn test_skip_transition_is_invalid() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create("ref", None).unwrap();

        let error = store
            .transition(job.id, JobStatus::Completed, Some(aggregate()))
            .unwrap_err();
        assert_eq!(
            error,
            JobStoreError::InvalidTransition {
                from: JobStatus::Pending,
                to: JobStatus::Completed,
            }
        );

        // Status unchanged after the rejected transition
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_terminal_states_admit_no_transition() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create("ref", None).unwrap();
        store.transition(job.id, JobStatus::Running, None).unwrap();
        store.transition(job.id, JobStatus::Failed, None).unwrap();

        let error = store
            .transition(job.id, JobStatus::Running, None)
            .unwrap_err();
        assert!(matches!(error, JobStoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cancel_pending_and_running() {
        let store = SqliteJobStore::in_memory().unwrap();

        let pending = store.create("ref", None).unwrap();
        assert_eq!(store.cancel(pending.id).unwrap().status, JobStatus::Cancelled);

        let running = store.create("ref", None).unwrap();
        store.transition(running.id, JobStatus::Running, None).unwrap();
        assert_eq!(store.cancel(running.id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_cancel_completed_is_already_terminal() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create("ref", None).unwrap();
        store.transition(job.id, JobStatus::Running, None).unwrap();
        store
            .transition(job.id, JobStatus::Completed, Some(aggregate()))
            .unwrap();

        let error = store.cancel(job.id).unwrap_err();
        assert_eq!(error, JobStoreError::AlreadyTerminal(JobStatus::Completed));

        // Status left unchanged
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_partial_completion_is_reachable() {
        let store = SqliteJobStore::in_memory().unwrap();
        let job = store.create("ref", None).unwrap();
        store.transition(job.id, JobStatus::Running, None).unwrap();
        store
            .transition(job.id, JobStatus::PartiallyCompleted, Some(aggregate()))
            .unwrap();

        assert_eq!(
            store.get(job.id).unwrap().status,
            JobStatus::PartiallyCompleted
        );
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        let id = {
            let store = SqliteJobStore::new(&path).unwrap();
            let job = store.create("https://example.com/doc", None).unwrap();
            store.transition(job.id, JobStatus::Running, None).unwrap();
            store
                .transition(job.id, JobStatus::Completed, Some(aggregate()))
                .unwrap();
            job.id
        };

        let reopened = SqliteJobStore::new(&path).unwrap();
        let job = reopened.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap().usage.prompt_tokens, 100);
    }
}
