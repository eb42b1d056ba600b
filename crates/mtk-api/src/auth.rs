//! API-key authentication.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use constant_time_eq::constant_time_eq;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` header does not match the configured key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        error!("API_KEY is not configured; rejecting request");
        return ApiError::Configuration("API key not configured on the server.".to_string())
            .into_response();
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if keys_match(key, expected) => next.run(request).await,
        _ => {
            warn!(uri = %request.uri(), "Rejected request with invalid or missing API key");
            ApiError::unauthorized("Invalid or missing API key.").into_response()
        }
    }
}

fn keys_match(provided: &str, expected: &str) -> bool {
    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secreT", "secret"));
        assert!(!keys_match("secret1", "secret"));
        assert!(!keys_match("", "secret"));
    }
}
