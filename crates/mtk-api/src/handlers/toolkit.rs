//! Toolkit utility endpoints.

use axum::Json;
use serde_json::{json, Value};

/// `GET /v1/toolkit/authenticate`: reached only with a valid API key.
pub async fn authenticate() -> Json<Value> {
    Json(json!({"message": "Authorized"}))
}
