//! In-process bounded job queue and job status stores.
//!
//! This crate provides:
//! - A FIFO task queue with atomic admission control
//! - Completion accounting (`task_done` / `join`)
//! - Job status sinks backed by memory or Redis

pub mod error;
pub mod queue;
pub mod redis_store;
pub mod status;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, QueueEntry, SubmitPermit, TaskQueue};
pub use redis_store::RedisStatusStore;
pub use status::{
    build_status_store, store_sink, JobStatusSink, JobStatusStore, MemoryStatusStore, StatusStoreConfig,
    JOB_STATUS_TTL_SECS,
};
