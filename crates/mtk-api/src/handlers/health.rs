//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub worker: String,
    pub queue_id: String,
    pub queue_length: usize,
    pub s3: bool,
    pub gdrive: bool,
}

/// Readiness check endpoint (readiness probe).
///
/// Not ready while the worker loop is down. Missing storage adapters are
/// reported but do not fail the probe.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let alive = state.is_worker_alive();
    let response = ReadinessResponse {
        status: if alive { "ready" } else { "not_ready" }.to_string(),
        checks: ReadinessChecks {
            worker: if alive { "running" } else { "stopped" }.to_string(),
            queue_id: state.queue().id().to_string(),
            queue_length: state.queue().len(),
            s3: state.storage.object,
            gdrive: state.storage.drive,
        },
    };

    if alive {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
