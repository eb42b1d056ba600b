//! Shared data models for the media toolkit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job ids and lifecycle states
//! - Status snapshots and outcome records written to the status sink
//! - The `/v1/ffmpeg/compose` wire payload
//! - Validated video assembly requests

pub mod assembly;
pub mod compose;
pub mod job;
pub mod job_status;
pub mod request;

// Re-export common types
pub use assembly::{AssemblyRequest, AssetLocator, ImageAsset, OutputTarget, ValidationError};
pub use compose::{AssetInput, ComposeInputs, ComposePayload, CompositorOptions, ImageInput, OutputTargetInput};
pub use job::{Job, JobId};
pub use job_status::{round_secs, JobOutcome, JobSnapshot, JobStatus, QueueLimit};
pub use request::{ComposeRequest, JobRequest, COMPOSE_ENDPOINT};
