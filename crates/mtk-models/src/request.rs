//! Typed requests carried through the task queue.

use serde::{Deserialize, Serialize};

use crate::ComposePayload;

/// Endpoint name reported in outcome records for compose jobs.
pub const COMPOSE_ENDPOINT: &str = "/v1/ffmpeg/compose";

/// Request for the compose operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub payload: ComposePayload,
}

impl ComposeRequest {
    pub fn new(payload: ComposePayload) -> Self {
        Self { payload }
    }
}

/// Every job kind the worker knows how to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobRequest {
    Compose(ComposeRequest),
}

impl JobRequest {
    /// Endpoint that accepted the request.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Compose(_) => COMPOSE_ENDPOINT,
        }
    }

    /// Caller-supplied correlation id.
    pub fn caller_id(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Compose(req) => req.payload.id.as_ref(),
        }
    }
}
