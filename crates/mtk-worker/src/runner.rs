//! Admission control: every request becomes a job, queued or run inline.

use std::sync::Arc;
use std::time::Instant;

use mtk_models::{Job, JobOutcome, JobRequest, JobSnapshot, JobStatus};
use mtk_queue::{JobStatusSink, QueueEntry, QueueError, TaskQueue};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::dispatcher::{execute_guarded, JobDispatcher};
use crate::logging::JobLogger;
use crate::metrics;
use crate::outcome::{self, Timing};
use crate::BUILD_NUMBER;

/// How a submitted job is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Enqueue for the worker and answer 202
    Queued,
    /// Run on the calling task and answer with the outcome
    Synchronous,
}

/// HTTP status and JSON body for a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResponse {
    pub status: u16,
    pub body: Value,
}

impl JobResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Turns requests into jobs and reports every transition to the sink.
#[derive(Clone)]
pub struct JobRunner {
    queue: Arc<TaskQueue>,
    sink: Arc<dyn JobStatusSink>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl JobRunner {
    pub fn new(
        queue: Arc<TaskQueue>,
        sink: Arc<dyn JobStatusSink>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            queue,
            sink,
            dispatcher,
        }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub async fn run_as_job(&self, request: JobRequest, mode: ExecutionMode) -> JobResponse {
        let job = Job::new(request);
        match mode {
            ExecutionMode::Queued => self.enqueue(job).await,
            ExecutionMode::Synchronous => self.run_inline(job).await,
        }
    }

    /// Admission runs on its own task, detached from the caller. Once a slot
    /// is reserved, the queued record and the enqueue both happen even if the
    /// request future is dropped.
    async fn enqueue(&self, job: Job) -> JobResponse {
        let runner = self.clone();
        let job_id = job.id.clone();
        match tokio::spawn(async move { runner.admit(job).await }).await {
            Ok(response) => response,
            Err(e) => {
                warn!(job_id = %job_id, "Admission task failed: {}", e);
                JobResponse::new(
                    500,
                    json!({"error": "Internal Server Error", "message": "Failed to queue job"}),
                )
            }
        }
    }

    async fn admit(&self, job: Job) -> JobResponse {
        let endpoint = job.request.endpoint();
        let permit = match self.queue.reserve() {
            Ok(permit) => permit,
            Err(QueueError::Full { max, len }) => {
                let message = QueueError::Full { max, len }.to_string();
                warn!(job_id = %job.id, queue_length = len, "Rejecting job: queue full");
                metrics::record_job_rejected(endpoint);
                return JobResponse::new(
                    429,
                    json!({
                        "code": 429,
                        "id": job.caller_id(),
                        "job_id": job.id,
                        "message": message,
                        "pid": std::process::id(),
                        "queue_id": self.queue.id(),
                        "queue_length": len,
                        "build_number": BUILD_NUMBER,
                    }),
                );
            }
            Err(e) => {
                warn!(job_id = %job.id, "Failed to reserve queue slot: {}", e);
                return JobResponse::new(
                    500,
                    json!({"error": "Internal Server Error", "message": "Failed to queue job"}),
                );
            }
        };

        // Recorded before the entry becomes visible to the worker.
        self.report(&job, JobStatus::Queued, None).await;

        let id = job.caller_id().cloned();
        let job_id = job.id.clone();
        let queue_length = permit.submit(QueueEntry::new(job));
        metrics::record_job_enqueued(endpoint);
        metrics::set_queue_length(queue_length);
        info!(job_id = %job_id, queue_length, "Job queued");

        JobResponse::new(
            202,
            json!({
                "code": 202,
                "id": id,
                "job_id": job_id,
                "message": "processing",
                "pid": std::process::id(),
                "queue_id": self.queue.id(),
                "max_queue_length": self.queue.limit(),
                "queue_length": queue_length,
                "build_number": BUILD_NUMBER,
            }),
        )
    }

    async fn run_inline(&self, mut job: Job) -> JobResponse {
        let logger = JobLogger::new(&job.id, job.request.endpoint());
        job.start();
        self.report(&job, JobStatus::Running, None).await;
        logger.running(0.0);

        let started = Instant::now();
        let result = execute_guarded(
            Arc::clone(&self.dispatcher),
            job.id.clone(),
            job.request.clone(),
        )
        .await;
        let timing = Timing {
            queue_time: 0.0,
            run_time: started.elapsed().as_secs_f64(),
        };

        match result {
            Ok(handled) => {
                let outcome = outcome::from_handler(&job, &handled, &self.queue, timing);
                let body = encode(&outcome);
                metrics::record_job_completed(&outcome.endpoint, outcome.code, timing.run_time);
                logger.finished(outcome.code, timing.run_time);
                job.finish(body.clone());
                self.report(&job, JobStatus::Done, Some(body.clone())).await;
                JobResponse::new(outcome.code, body)
            }
            Err(e) => {
                logger.failed(&e);
                let outcome = outcome::from_failure(
                    &job,
                    format!("Internal server error during sync execution: {}", e),
                    &self.queue,
                    timing,
                );
                let detail = encode(&outcome);
                metrics::record_job_failed(&outcome.endpoint);
                job.fail(detail.clone());
                self.report(&job, JobStatus::Failed, Some(detail)).await;
                JobResponse::new(
                    500,
                    json!({"error": "Internal Server Error", "message": "Processing failed"}),
                )
            }
        }
    }

    async fn report(&self, job: &Job, status: JobStatus, response: Option<Value>) {
        let snapshot = JobSnapshot::new(status, job.id.clone(), self.queue.id(), response);
        if let Err(e) = self.sink.record(&job.id, &snapshot).await {
            warn!(job_id = %job.id, status = %status, "Failed to record job status: {}", e);
        }
    }
}

fn encode(outcome: &JobOutcome) -> Value {
    serde_json::to_value(outcome).unwrap_or(Value::Null)
}
