//! Per-job structured logging.
//!
//! Every event carries `job_id` and `endpoint` so a single job can be
//! followed from admission through each assembly stage to its outcome.

use std::fmt::Display;
use std::path::Path;

use mtk_models::JobId;
use tracing::{error, info, warn, Level, Span};

/// Steps of the assembly pipeline, reported as the `stage` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Render,
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Render => "render",
            Self::Upload => "upload",
        }
    }
}

/// Level used for a handler result carrying `code`.
pub fn outcome_level(code: u16) -> Level {
    match code {
        0..=399 => Level::INFO,
        400..=499 => Level::WARN,
        _ => Level::ERROR,
    }
}

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    endpoint: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, endpoint: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Span for the handler task.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, endpoint = %self.endpoint)
    }

    /// The job left the queue (or bypassed it) and is now running.
    pub fn running(&self, queue_time: f64) {
        info!(
            job_id = %self.job_id,
            endpoint = %self.endpoint,
            queue_time,
            "Job running"
        );
    }

    pub fn stage(&self, stage: Stage, detail: impl Display) {
        info!(
            job_id = %self.job_id,
            endpoint = %self.endpoint,
            stage = stage.as_str(),
            "{}", detail
        );
    }

    /// The handler returned. Error codes are logged above info.
    pub fn finished(&self, code: u16, run_time: f64) {
        let level = outcome_level(code);
        if level == Level::INFO {
            info!(job_id = %self.job_id, endpoint = %self.endpoint, code, run_time, "Job done");
        } else if level == Level::WARN {
            warn!(job_id = %self.job_id, endpoint = %self.endpoint, code, run_time, "Job done with client error");
        } else {
            error!(job_id = %self.job_id, endpoint = %self.endpoint, code, run_time, "Job done with server error");
        }
    }

    /// The handler failed unexpectedly.
    pub fn failed(&self, err: impl Display) {
        error!(
            job_id = %self.job_id,
            endpoint = %self.endpoint,
            error = %err,
            "Job failed"
        );
    }

    pub fn cleanup_failed(&self, path: &Path, err: impl Display) {
        warn!(
            job_id = %self.job_id,
            path = %path.display(),
            error = %err,
            "Failed to remove work directory"
        );
    }
}
