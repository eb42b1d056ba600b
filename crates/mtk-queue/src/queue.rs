//! FIFO task queue shared by request handlers and the worker.
//!
//! Admission is a two-step reservation: [`TaskQueue::reserve`] checks the
//! bound and claims a slot under the queue lock, and the returned
//! [`SubmitPermit`] either enqueues the entry or releases the slot on drop.
//! Concurrent submitters therefore never push the queue past its bound.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use mtk_models::{Job, QueueLimit};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Maximum queued entries, 0 = unbounded
    pub max_queue_length: usize,
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_queue_length: std::env::var("MAX_QUEUE_LENGTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// A job waiting for the worker.
#[derive(Debug)]
pub struct QueueEntry {
    pub job: Job,
    /// Monotonic enqueue time, used for wait-time accounting
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            enqueued_at: Instant::now(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: VecDeque<QueueEntry>,
    /// Slots claimed by permits not yet submitted
    reserved: usize,
    /// Submitted entries not yet marked done
    unfinished: usize,
}

/// In-memory FIFO queue with an optional hard bound.
#[derive(Debug)]
pub struct TaskQueue {
    id: String,
    limit: QueueLimit,
    state: Mutex<State>,
    available: Notify,
    drained: Notify,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("queue_{}", &simple[..12]),
            limit: QueueLimit::from_config(config.max_queue_length),
            state: Mutex::new(State::default()),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Unbounded queue.
    pub fn unbounded() -> Self {
        Self::new(QueueConfig::default())
    }

    /// Identifier reported in job snapshots.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limit(&self) -> QueueLimit {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries waiting to be dequeued, including reserved slots.
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.entries.len() + state.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submitted entries whose processing has not been marked done.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }

    /// Claim a slot, failing when the bound is reached.
    pub fn reserve(&self) -> QueueResult<SubmitPermit<'_>> {
        let mut state = self.lock();
        let len = state.entries.len() + state.reserved;
        if let QueueLimit::Max(max) = self.limit {
            if len >= max {
                return Err(QueueError::Full { max, len });
            }
        }
        state.reserved += 1;
        Ok(SubmitPermit {
            queue: self,
            used: false,
        })
    }

    /// Reserve and enqueue in one step. Returns the queue length afterwards.
    pub fn submit(&self, entry: QueueEntry) -> QueueResult<usize> {
        Ok(self.reserve()?.submit(entry))
    }

    /// Wait for the next entry in FIFO order.
    pub async fn dequeue(&self) -> QueueEntry {
        loop {
            let notified = self.available.notified();
            let next = self.lock().entries.pop_front();
            if let Some(entry) = next {
                return entry;
            }
            notified.await;
        }
    }

    /// Mark one dequeued entry as fully processed.
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every submitted entry has been marked done.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let unfinished = self.lock().unfinished;
            if unfinished == 0 {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, entry: QueueEntry) -> usize {
        let len = {
            let mut state = self.lock();
            state.reserved = state.reserved.saturating_sub(1);
            state.unfinished += 1;
            debug!(job_id = %entry.job.id, "Enqueued job");
            state.entries.push_back(entry);
            state.entries.len() + state.reserved
        };
        self.available.notify_one();
        len
    }

    fn release(&self) {
        let mut state = self.lock();
        state.reserved = state.reserved.saturating_sub(1);
    }
}

/// A claimed queue slot.
#[must_use = "dropping a permit releases the slot"]
#[derive(Debug)]
pub struct SubmitPermit<'a> {
    queue: &'a TaskQueue,
    used: bool,
}

impl SubmitPermit<'_> {
    /// Enqueue into the claimed slot. Returns the queue length afterwards.
    pub fn submit(mut self, entry: QueueEntry) -> usize {
        self.used = true;
        self.queue.push(entry)
    }
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        if !self.used {
            self.queue.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_models::{ComposePayload, ComposeRequest, JobRequest};
    use std::sync::Arc;
    use std::time::Duration;

    fn entry() -> QueueEntry {
        let request = JobRequest::Compose(ComposeRequest::new(ComposePayload::default()));
        QueueEntry::new(Job::new(request))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TaskQueue::unbounded();
        let ids: Vec<_> = (0..3)
            .map(|_| {
                let e = entry();
                let id = e.job.id.clone();
                queue.submit(e).unwrap();
                id
            })
            .collect();

        for id in ids {
            assert_eq!(queue.dequeue().await.job.id, id);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_bound_rejects_at_capacity() {
        let queue = TaskQueue::new(QueueConfig { max_queue_length: 2 });
        assert_eq!(queue.submit(entry()).unwrap(), 1);
        assert_eq!(queue.submit(entry()).unwrap(), 2);

        match queue.submit(entry()) {
            Err(QueueError::Full { max, len }) => {
                assert_eq!(max, 2);
                assert_eq!(len, 2);
            }
            other => panic!("expected Full, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unbounded_never_rejects() {
        let queue = TaskQueue::unbounded();
        for _ in 0..1000 {
            queue.submit(entry()).unwrap();
        }
        assert_eq!(queue.len(), 1000);
    }

    #[test]
    fn test_reservation_counts_toward_bound() {
        let queue = TaskQueue::new(QueueConfig { max_queue_length: 1 });
        let permit = queue.reserve().unwrap();
        assert!(matches!(queue.reserve(), Err(QueueError::Full { len: 1, .. })));

        drop(permit);
        assert_eq!(queue.len(), 0);
        assert!(queue.reserve().is_ok());
    }

    #[test]
    fn test_concurrent_submitters_respect_bound() {
        let queue = Arc::new(TaskQueue::new(QueueConfig { max_queue_length: 5 }));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || queue.submit(entry()).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 5);
        assert_eq!(queue.len(), 5);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_submit() {
        let queue = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let e = entry();
        let id = e.job.id.clone();
        queue.submit(e).unwrap();

        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.job.id, id);
    }

    #[tokio::test]
    async fn test_join_waits_for_task_done() {
        let queue = Arc::new(TaskQueue::unbounded());
        queue.submit(entry()).unwrap();
        queue.submit(entry()).unwrap();

        let joiner = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.join().await })
        };

        let _ = queue.dequeue().await;
        queue.task_done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!joiner.is_finished());

        let _ = queue.dequeue().await;
        queue.task_done();
        tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.unfinished(), 0);
    }

    #[test]
    fn test_queue_id_format() {
        let queue = TaskQueue::unbounded();
        assert!(queue.id().starts_with("queue_"));
        assert_eq!(queue.id().len(), "queue_".len() + 12);
    }
}
