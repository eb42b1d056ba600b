//! Job executor: the single consumer of the task queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mtk_models::{Job, JobOutcome, JobSnapshot, JobStatus};
use mtk_queue::{JobStatusSink, QueueEntry, TaskQueue};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dispatcher::{execute_guarded, JobDispatcher};
use crate::logging::JobLogger;
use crate::metrics;
use crate::outcome::{self, Timing};

/// Processes queued jobs one at a time, in FIFO order.
///
/// A failing or panicking job never stops the loop.
pub struct JobExecutor {
    queue: Arc<TaskQueue>,
    sink: Arc<dyn JobStatusSink>,
    dispatcher: Arc<dyn JobDispatcher>,
    shutdown: watch::Sender<bool>,
    alive: Arc<AtomicBool>,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<TaskQueue>,
        sink: Arc<dyn JobStatusSink>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            sink,
            dispatcher,
            shutdown,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stays `true` while the loop is running.
    pub fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.alive)
    }

    /// Run the loop on its own task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Stop after the job in flight, if any, has finished.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        self.alive.store(true, Ordering::SeqCst);
        info!(queue_id = %self.queue.id(), "Starting job executor");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                entry = self.queue.dequeue() => {
                    self.process(entry).await;
                }
            }
        }

        self.alive.store(false, Ordering::SeqCst);
        info!("Job executor stopped");
    }

    /// Handle one dequeued entry. The entry is always marked done.
    pub async fn process(&self, entry: QueueEntry) {
        let _done = TaskDone(&self.queue);
        let QueueEntry { mut job, enqueued_at } = entry;
        let queue_time = enqueued_at.elapsed().as_secs_f64();
        let logger = JobLogger::new(&job.id, job.request.endpoint());
        metrics::record_queue_wait(queue_time);
        metrics::set_queue_length(self.queue.len());

        job.start();
        self.report(&job, JobStatus::Running, None).await;
        logger.running(queue_time);

        let started = Instant::now();
        let result = execute_guarded(
            Arc::clone(&self.dispatcher),
            job.id.clone(),
            job.request.clone(),
        )
        .await;
        let timing = Timing {
            queue_time,
            run_time: started.elapsed().as_secs_f64(),
        };

        match result {
            Ok(handled) => {
                let outcome = outcome::from_handler(&job, &handled, &self.queue, timing);
                metrics::record_job_completed(&outcome.endpoint, outcome.code, timing.run_time);
                logger.finished(outcome.code, timing.run_time);
                self.finish(&mut job, JobStatus::Done, &outcome).await;
            }
            Err(e) => {
                logger.failed(&e);
                let outcome = outcome::from_failure(&job, e.to_string(), &self.queue, timing);
                metrics::record_job_failed(&outcome.endpoint);
                self.finish(&mut job, JobStatus::Failed, &outcome).await;
            }
        }
    }

    async fn finish(&self, job: &mut Job, status: JobStatus, outcome: &JobOutcome) {
        let value = match serde_json::to_value(outcome) {
            Ok(value) => value,
            Err(e) => {
                error!(job_id = %job.id, "Failed to encode job outcome: {}", e);
                serde_json::Value::Null
            }
        };
        match status {
            JobStatus::Failed => job.fail(value.clone()),
            _ => job.finish(value.clone()),
        }
        self.report(job, status, Some(value)).await;
    }

    async fn report(&self, job: &Job, status: JobStatus, response: Option<serde_json::Value>) {
        let snapshot = JobSnapshot::new(status, job.id.clone(), self.queue.id(), response);
        if let Err(e) = self.sink.record(&job.id, &snapshot).await {
            warn!(job_id = %job.id, status = %status, "Failed to record job status: {}", e);
        }
    }
}

/// Marks the current entry done when dropped.
struct TaskDone<'a>(&'a TaskQueue);

impl Drop for TaskDone<'_> {
    fn drop(&mut self) {
        self.0.task_done();
    }
}
