//! Job definitions for queue processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{JobRequest, JobStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work accepted by admission control.
///
/// Only the worker loop and admission control move a job between states.
/// Transitions out of a terminal state are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Typed request payload
    pub request: JobRequest,

    /// When the job was accepted
    pub enqueued_at: DateTime<Utc>,

    /// When the handler started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the handler finished (either way)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Handler output or error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl Job {
    /// Create a queued job with a fresh id.
    pub fn new(request: JobRequest) -> Self {
        Self::with_id(JobId::new(), request)
    }

    pub fn with_id(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            request,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            result: None,
        }
    }

    /// Caller-supplied correlation id carried by the request, if any.
    pub fn caller_id(&self) -> Option<&serde_json::Value> {
        self.request.caller_id()
    }

    pub fn start(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, result: serde_json::Value) {
        self.terminate(JobStatus::Done, result);
    }

    pub fn fail(&mut self, result: serde_json::Value) {
        self.terminate(JobStatus::Failed, result);
    }

    fn terminate(&mut self, status: JobStatus, result: serde_json::Value) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComposePayload, ComposeRequest};
    use serde_json::json;

    fn request() -> JobRequest {
        let payload: ComposePayload = serde_json::from_value(json!({"id": "caller-7"})).unwrap();
        JobRequest::Compose(ComposeRequest::new(payload))
    }

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new(request());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.caller_id(), Some(&json!("caller-7")));

        job.start();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.finish(json!({"ok": true}));
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut job = Job::new(request());
        job.start();
        job.fail(json!({"error": "boom"}));
        job.finish(json!({"ok": true}));
        job.start();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.result, Some(json!({"error": "boom"})));
    }
}
