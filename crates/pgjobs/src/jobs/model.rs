use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One job row, as returned by every engine operation and by `jobs."all"`.
///
/// Rows coming from the queue carry a `NULL` result; rows from history carry
/// a `NULL` lease.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Job {
    pub job_id: Uuid,
    pub task: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timeout: f64,
    pub priority: i32,
    pub max_retries: i32,
    pub retries: i32,
    pub status: String,
    pub last_error: Option<String>,
    pub result: Option<Value>,
    pub leased_until: Option<DateTime<Utc>>,
}

/// Input to `publish` / `publish_bulk`. Optional knobs fall back to the
/// engine defaults (timeout 60s, priority 0, max_retries 3).
#[derive(Debug, Clone)]
pub struct NewJob {
    pub task: String,
    pub body: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub timeout: Option<f64>,
    pub priority: Option<i32>,
    pub max_retries: Option<i32>,
}

impl NewJob {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            body: Value::Null,
            scheduled_at: None,
            timeout: None,
            priority: None,
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

/// Counters over the operator views, for `/stats` and log lines.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub queued: i64,
    pub running: i64,
    pub expired: i64,
    pub success: i64,
    pub failed: i64,
}
