use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// "Call handler `handler` with `args`": the only thing a job can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Identifier the handler was registered under (e.g. `"notify.chat"`).
    pub handler: String,
    /// Arbitrary JSON payload handed to the handler.
    pub args: serde_json::Value,
}

impl Invocation {
    pub fn new(handler: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            handler: handler.into(),
            args,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its due time (or a free worker).
    Pending,
    /// Claimed by a worker.
    Executing,
    /// Handler returned successfully.
    Done,
    /// Handler failed, panicked, or was not registered.
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Executing,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Executing => "executing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "executing" => Ok(JobStatus::Executing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// UUID v4 string: primary key.
    pub id: String,
    /// Human-readable label, used in logs.
    pub name: String,
    pub invocation: Invocation,
    pub status: JobStatus,
    /// Not attempted before this instant.
    pub due_at: DateTime<Utc>,
    /// Number of times a worker claimed the job (more than 1 after crash recovery).
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fixed-width UTC timestamp so that string comparison in SQL matches time order.
pub(crate) fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
