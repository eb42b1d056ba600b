//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Task queue is full (MAX_QUEUE_LENGTH={max}). Please try again later.")]
    Full { max: usize, len: usize },

    #[error("Status store error: {0}")]
    StatusStore(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn status_store(msg: impl Into<String>) -> Self {
        Self::StatusStore(msg.into())
    }
}
