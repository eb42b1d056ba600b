//! `POST /v1/ffmpeg/compose`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mtk_models::{ComposePayload, ComposeRequest, JobRequest};
use mtk_worker::ExecutionMode;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

const INVALID_JSON: &str = "Invalid JSON payload received.";

#[derive(Debug, Default, Deserialize)]
pub struct ComposeQuery {
    /// `true` runs the job inline instead of queueing it
    #[serde(default)]
    pub sync: Option<String>,
}

impl ComposeQuery {
    pub fn mode(&self) -> ExecutionMode {
        match self.sync.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("true") | Some("1") | Some("yes") => ExecutionMode::Synchronous,
            _ => ExecutionMode::Queued,
        }
    }
}

/// Submit a compose job.
pub async fn compose(
    State(state): State<AppState>,
    Query(query): Query<ComposeQuery>,
    payload: Result<Json<ComposePayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("Rejected compose payload: {}", rejection.body_text());
            return ApiError::bad_request(INVALID_JSON).into_response();
        }
    };

    let request = JobRequest::Compose(ComposeRequest::new(payload));
    let response = state.runner.run_as_job(request, query.mode()).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(response.body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_query() {
        let query = |s: Option<&str>| ComposeQuery { sync: s.map(String::from) };
        assert_eq!(query(None).mode(), ExecutionMode::Queued);
        assert_eq!(query(Some("false")).mode(), ExecutionMode::Queued);
        assert_eq!(query(Some("TRUE")).mode(), ExecutionMode::Synchronous);
        assert_eq!(query(Some("1")).mode(), ExecutionMode::Synchronous);
    }
}
