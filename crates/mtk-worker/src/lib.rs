//! Job worker for the media toolkit.
//!
//! This crate provides:
//! - Admission control (`JobRunner::run_as_job`) for queued and synchronous jobs
//! - The single-consumer worker loop (`JobExecutor`)
//! - Request dispatch to job handlers
//! - The video assembly pipeline (download, compose, upload, cleanup)

pub mod assembly;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod runner;

pub use assembly::{AssemblyError, AssemblyOutput, AssemblyPipeline};
pub use config::WorkerConfig;
pub use dispatcher::{execute_guarded, HandlerOutcome, JobDispatcher, JobError, ToolkitDispatcher};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use runner::{ExecutionMode, JobResponse, JobRunner};

/// Build identifier reported to clients.
pub const BUILD_NUMBER: &str = env!("CARGO_PKG_VERSION");
