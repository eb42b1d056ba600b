//! Job status polling.

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use mtk_models::{JobId, JobSnapshot};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default look-back window for `jobs/status`.
pub const DEFAULT_SINCE_SECONDS: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct JobStatusRequest {
    pub job_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsStatusRequest {
    #[serde(default)]
    pub since_seconds: Option<i64>,
}

/// `POST /v1/toolkit/job/status`: latest snapshot of one job.
pub async fn job_status(
    State(state): State<AppState>,
    body: Result<Json<JobStatusRequest>, JsonRejection>,
) -> ApiResult<Json<JobSnapshot>> {
    let Json(body) = body.map_err(|_| ApiError::bad_request("Missing or invalid 'job_id'."))?;
    if body.job_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing or invalid 'job_id'."));
    }

    let job_id = JobId::from_string(body.job_id);
    match state.store.get(&job_id).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(ApiError::not_found(format!("Job {} not found.", job_id))),
    }
}

/// `POST /v1/toolkit/jobs/status`: every job updated in the window, keyed by id.
pub async fn jobs_status(
    State(state): State<AppState>,
    body: Option<Json<JobsStatusRequest>>,
) -> ApiResult<Json<HashMap<JobId, JobSnapshot>>> {
    let since_seconds = body
        .and_then(|Json(b)| b.since_seconds)
        .unwrap_or(DEFAULT_SINCE_SECONDS);
    if since_seconds < 0 {
        return Err(ApiError::bad_request("'since_seconds' must not be negative."));
    }

    let since = Utc::now() - Duration::seconds(since_seconds);
    let snapshots = state.store.list_since(since).await?;
    Ok(Json(
        snapshots
            .into_iter()
            .map(|s| (s.job_id.clone(), s))
            .collect(),
    ))
}
