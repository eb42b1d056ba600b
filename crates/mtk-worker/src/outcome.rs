//! Outcome records shared by the worker loop and the bypass path.

use mtk_models::{round_secs, Job, JobOutcome};
use mtk_queue::TaskQueue;

use crate::dispatcher::HandlerOutcome;
use crate::BUILD_NUMBER;

/// Seconds spent waiting in the queue and running the handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timing {
    pub queue_time: f64,
    pub run_time: f64,
}

impl Timing {
    pub fn total(&self) -> f64 {
        self.queue_time + self.run_time
    }
}

/// Outcome for a handler that returned normally.
pub fn from_handler(job: &Job, handled: &HandlerOutcome, queue: &TaskQueue, timing: Timing) -> JobOutcome {
    build(
        job,
        handled.endpoint.clone(),
        handled.status_code,
        handled.response(),
        handled.message(),
        queue,
        timing,
    )
}

/// Outcome for a handler that produced no result.
pub fn from_failure(job: &Job, message: String, queue: &TaskQueue, timing: Timing) -> JobOutcome {
    build(
        job,
        job.request.endpoint().to_string(),
        500,
        None,
        message,
        queue,
        timing,
    )
}

fn build(
    job: &Job,
    endpoint: String,
    code: u16,
    response: Option<serde_json::Value>,
    message: String,
    queue: &TaskQueue,
    timing: Timing,
) -> JobOutcome {
    JobOutcome {
        endpoint,
        code,
        id: job.caller_id().cloned(),
        job_id: job.id.clone(),
        response,
        message,
        pid: std::process::id(),
        queue_id: queue.id().to_string(),
        run_time: round_secs(timing.run_time),
        queue_time: round_secs(timing.queue_time),
        total_time: round_secs(timing.total()),
        queue_length: queue.len(),
        build_number: BUILD_NUMBER.to_string(),
    }
}
