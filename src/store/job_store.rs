//! Job registry: durable record of one job's identity, inputs, status, and
//! result pointer.
//!
//! All ordering-bearing writes are conditional updates guarded on existence
//! or current status; each method returns whether the write applied, which
//! is how callers observe a failed precondition. The guards are what keep
//! concurrent or retried stage invocations from producing conflicting state.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::StoreError;
use crate::models::{InputLocation, Job, JobStatus};

pub trait JobStore: Send + Sync {
    fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Create the job record. Intake-side operation; the pipeline stages
    /// themselves never insert.
    fn put(&self, job: &Job) -> Result<(), StoreError>;

    /// Claim the job for an execution: move `created` → `started` and record
    /// the execution reference. The guard accepts a fresh job or a repeat
    /// claim by the same execution (step-level retry); a different execution
    /// claiming a non-fresh job does not apply.
    fn mark_started(&self, job_id: &str, execution_ref: &str) -> Result<bool, StoreError>;

    /// Advance to `processing`. Applies only from `started`/`processing`.
    fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError>;

    /// Record the execution reference, guarded only on the job existing.
    fn record_execution_ref(&self, job_id: &str, execution_ref: &str) -> Result<bool, StoreError>;

    /// Terminal transition with the result pointer. Applies only while the
    /// job is not yet terminal.
    fn finalize(
        &self,
        job_id: &str,
        status: JobStatus,
        result_ref: &str,
    ) -> Result<bool, StoreError>;
}

/// SQLite-backed job registry.
///
/// The connection sits behind a `Mutex` so the adapter is `Send + Sync` for
/// the stateless stage structs that hold it; every call re-reads store state.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&conn)
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status_str: String = row.get("status")?;
    let status = JobStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown job status: {status_str}").into(),
        )
    })?;

    let input_store_ref: Option<String> = row.get("input_store_ref")?;
    let input_key: Option<String> = row.get("input_key")?;
    let input = match (input_store_ref, input_key) {
        (Some(store_ref), Some(key)) => Some(InputLocation { store_ref, key }),
        _ => None,
    };

    Ok(Job {
        id: row.get("job_id")?,
        name: row.get("job_name")?,
        institution_id: row.get("institution_id")?,
        config_id: row.get("config_id")?,
        input,
        status,
        execution_ref: row.get("execution_ref")?,
        result_ref: row.get("result_ref")?,
        connection_ref: row.get("connection_ref")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl JobStore for SqliteJobStore {
    fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.with_conn(|conn| {
            let job = conn
                .query_row(
                    "SELECT job_id, job_name, institution_id, config_id,
                            input_store_ref, input_key, status, execution_ref,
                            result_ref, connection_ref, created_at, updated_at
                     FROM jobs WHERE job_id = ?1",
                    params![job_id],
                    job_from_row,
                )
                .optional()?;
            Ok(job)
        })
    }

    fn put(&self, job: &Job) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs
                 (job_id, job_name, institution_id, config_id, input_store_ref,
                  input_key, status, execution_ref, result_ref, connection_ref,
                  created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    job.id,
                    job.name,
                    job.institution_id,
                    job.config_id,
                    job.input.as_ref().map(|i| i.store_ref.as_str()),
                    job.input.as_ref().map(|i| i.key.as_str()),
                    job.status.as_str(),
                    job.execution_ref,
                    job.result_ref,
                    job.connection_ref,
                    job.created_at,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    fn mark_started(&self, job_id: &str, execution_ref: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            // A repeat claim by the same execution keeps whatever progress the
            // job has already made instead of rewinding it to 'started'.
            let changed = conn.execute(
                "UPDATE jobs
                 SET status = CASE WHEN status = 'created' THEN 'started' ELSE status END,
                     execution_ref = ?2,
                     updated_at = ?3
                 WHERE job_id = ?1
                   AND (status = 'created'
                        OR (execution_ref = ?2 AND status NOT IN ('completed', 'failed')))",
                params![job_id, execution_ref, Utc::now()],
            )?;
            Ok(changed > 0)
        })
    }

    fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = 'processing', updated_at = ?2
                 WHERE job_id = ?1 AND status IN ('started', 'processing')",
                params![job_id, Utc::now()],
            )?;
            Ok(changed > 0)
        })
    }

    fn record_execution_ref(&self, job_id: &str, execution_ref: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET execution_ref = ?2, updated_at = ?3 WHERE job_id = ?1",
                params![job_id, execution_ref, Utc::now()],
            )?;
            Ok(changed > 0)
        })
    }

    fn finalize(
        &self,
        job_id: &str,
        status: JobStatus,
        result_ref: &str,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = ?2, result_ref = ?3, updated_at = ?4
                 WHERE job_id = ?1 AND status NOT IN ('completed', 'failed')",
                params![job_id, status.as_str(), result_ref, Utc::now()],
            )?;
            Ok(changed > 0)
        })
    }
}
