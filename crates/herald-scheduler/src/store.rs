use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    types::{db_timestamp, Invocation, Job, JobStatus},
};

const JOB_COLUMNS: &str =
    "id, name, invocation, status, due_at, attempts, last_error, created_at, updated_at";

/// SQLite-backed job table. Cheap to clone; clones share the connection.
///
/// This is the only code that mutates job state.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        init_db(&conn.lock().unwrap_or_else(|e| e.into_inner()))?;
        Ok(Self { conn })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a pending job. Returns the fully populated [`Job`] record.
    pub fn insert(&self, name: &str, invocation: Invocation, due_at: DateTime<Utc>) -> Result<Job> {
        let now_str = db_timestamp(Utc::now());
        let id = Uuid::new_v4().to_string();
        let invocation_json = serde_json::to_string(&invocation)
            .map_err(|e| SchedulerError::InvalidInvocation(e.to_string()))?;

        self.conn().execute(
            "INSERT INTO scheduled_jobs
             (id, name, invocation, status, due_at, attempts, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, 0, NULL, ?5, ?5)",
            params![id, name, invocation_json, db_timestamp(due_at), now_str],
        )?;

        info!(job_id = %id, %name, handler = %invocation.handler, due_at = %due_at, "job enqueued");

        Ok(Job {
            id,
            name: name.to_string(),
            invocation,
            status: JobStatus::Pending,
            due_at,
            attempts: 0,
            last_error: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    /// Atomically move up to `limit` due jobs from `pending` to `executing`.
    ///
    /// Jobs whose stored invocation no longer decodes are failed on the spot
    /// and not returned.
    pub fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let now_str = db_timestamp(now);
        let conn = self.conn();

        // Collect eagerly inside the block so `stmt` is dropped before the
        // UPDATEs below borrow `conn` again.
        let due: Vec<RawJob> = {
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM scheduled_jobs
                 WHERE status = 'pending' AND due_at <= ?1
                 ORDER BY due_at LIMIT ?2"
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![now_str, limit as i64], RawJob::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut claimed = Vec::with_capacity(due.len());
        for raw in due {
            let invocation: Invocation = match serde_json::from_str(&raw.invocation) {
                Ok(inv) => inv,
                Err(e) => {
                    error!(job_id = %raw.id, "bad invocation JSON: {e}");
                    conn.execute(
                        "UPDATE scheduled_jobs SET status = 'failed', last_error = ?2, updated_at = ?3
                         WHERE id = ?1 AND status = 'pending'",
                        params![raw.id, format!("invalid invocation: {e}"), now_str],
                    )?;
                    continue;
                }
            };

            // The status guard makes the claim exclusive even if two engines poll one file.
            let n = conn.execute(
                "UPDATE scheduled_jobs
                 SET status = 'executing', attempts = attempts + 1, updated_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![raw.id, now_str],
            )?;
            if n == 0 {
                continue;
            }

            let mut job = raw.into_job(invocation);
            job.status = JobStatus::Executing;
            job.attempts += 1;
            job.updated_at = now_str.clone();
            claimed.push(job);
        }
        Ok(claimed)
    }

    pub fn mark_done(&self, id: &str) -> Result<()> {
        self.finish(id, JobStatus::Done, None)
    }

    pub fn mark_failed(&self, id: &str, reason: &str) -> Result<()> {
        self.finish(id, JobStatus::Failed, Some(reason))
    }

    fn finish(&self, id: &str, status: JobStatus, reason: Option<&str>) -> Result<()> {
        let now = db_timestamp(Utc::now());
        let n = self.conn().execute(
            "UPDATE scheduled_jobs SET status = ?2, last_error = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, status.as_str(), reason, now],
        )?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Reset jobs a previous process left `executing` back to `pending`.
    ///
    /// Called once on engine start; this is where duplicate delivery comes from.
    pub fn recover_interrupted(&self) -> Result<usize> {
        let now = db_timestamp(Utc::now());
        let n = self.conn().execute(
            "UPDATE scheduled_jobs SET status = 'pending', updated_at = ?1
             WHERE status = 'executing'",
            [&now],
        )?;
        if n > 0 {
            warn!(count = n, "interrupted jobs returned to pending");
        }
        Ok(n)
    }

    pub fn get(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.conn();
        let sql = format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE id = ?1");
        let raw = conn.query_row(&sql, [id], RawJob::from_row).optional()?;
        Ok(raw.and_then(RawJob::decode))
    }

    /// Return all known jobs ordered by due time.
    pub fn list(&self) -> Result<Vec<Job>> {
        let conn = self.conn();
        let sql = format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs ORDER BY due_at, created_at");
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], RawJob::from_row)?
            .filter_map(|r| r.ok())
            .filter_map(RawJob::decode)
            .collect();
        Ok(jobs)
    }

    /// Number of jobs in each status (statuses with no jobs are included as 0).
    pub fn status_counts(&self) -> Result<HashMap<JobStatus, u64>> {
        let conn = self.conn();
        let mut counts: HashMap<JobStatus, u64> =
            JobStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM scheduled_jobs GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, n) = row?;
            if let Ok(status) = status.parse::<JobStatus>() {
                counts.insert(status, n as u64);
            }
        }
        Ok(counts)
    }
}

/// Row as stored, before the JSON/enum columns are decoded.
struct RawJob {
    id: String,
    name: String,
    invocation: String,
    status: String,
    due_at: String,
    attempts: u32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawJob {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            invocation: row.get(2)?,
            status: row.get(3)?,
            due_at: row.get(4)?,
            attempts: row.get(5)?,
            last_error: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn decode(self) -> Option<Job> {
        let invocation = serde_json::from_str(&self.invocation).ok()?;
        Some(self.into_job(invocation))
    }

    fn into_job(self, invocation: Invocation) -> Job {
        let status = self.status.parse().unwrap_or(JobStatus::Failed);
        let due_at = DateTime::parse_from_rfc3339(&self.due_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();
        Job {
            id: self.id,
            name: self.name,
            invocation,
            status,
            due_at,
            attempts: self.attempts,
            last_error: self.last_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
