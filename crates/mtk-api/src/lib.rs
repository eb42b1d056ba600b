//! Axum HTTP API server.
//!
//! This crate provides:
//! - The compose submission endpoint, queued or synchronous
//! - Job status polling backed by the status store
//! - API-key authentication and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
