//! Job status snapshots and outcome records.
//!
//! Every lifecycle transition is reported to the status sink as a
//! [`JobSnapshot`]. Finished jobs carry a [`JobOutcome`] as their response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and waiting for the worker
    #[default]
    Queued,
    /// Handler is executing
    Running,
    /// Handler returned, possibly with a non-200 code
    Done,
    /// Handler failed unexpectedly
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Latest known state of a job, keyed by job id in the status sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_status: JobStatus,
    pub job_id: JobId,
    pub queue_id: String,
    pub process_id: u32,
    pub response: Option<serde_json::Value>,
    /// When this snapshot was produced
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn new(
        job_status: JobStatus,
        job_id: JobId,
        queue_id: impl Into<String>,
        response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            job_status,
            job_id,
            queue_id: queue_id.into(),
            process_id: std::process::id(),
            response,
            updated_at: Utc::now(),
        }
    }
}

/// Configured queue bound as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLimit {
    Unlimited,
    Max(usize),
}

impl QueueLimit {
    /// `0` means unbounded.
    pub fn from_config(max: usize) -> Self {
        if max == 0 {
            Self::Unlimited
        } else {
            Self::Max(max)
        }
    }
}

impl Serialize for QueueLimit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serializer.serialize_str("unlimited"),
            Self::Max(max) => serializer.serialize_u64(*max as u64),
        }
    }
}

/// Record describing how a job ended, stored as the response of the
/// terminal snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub endpoint: String,
    pub code: u16,
    /// Caller-supplied correlation id
    pub id: Option<serde_json::Value>,
    pub job_id: JobId,
    /// Handler output, present only for code 200
    pub response: Option<serde_json::Value>,
    /// `"success"` for code 200, otherwise the error text
    pub message: String,
    pub pid: u32,
    pub queue_id: String,
    pub run_time: f64,
    pub queue_time: f64,
    pub total_time: f64,
    pub queue_length: usize,
    pub build_number: String,
}

impl JobOutcome {
    /// Whether the handler reported success.
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Round a duration in seconds to millisecond precision.
pub fn round_secs(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
