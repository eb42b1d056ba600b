//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use mtk_models::COMPOSE_ENDPOINT;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::require_api_key;
use crate::handlers::{authenticate, compose, health, job_status, jobs_status, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route(COMPOSE_ENDPOINT, post(compose))
        .route("/v1/toolkit/authenticate", get(authenticate))
        .route("/v1/toolkit/job/status", post(job_status))
        .route("/v1/toolkit/jobs/status", post(jobs_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
