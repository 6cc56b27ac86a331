use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use brazil_race_classifier::error::AppError;
use brazil_race_classifier::sources::{SourceCatalog, SourceIssue};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub(crate) struct SourceValidationResponse {
    pub(crate) valid: bool,
    pub(crate) urls_checked: usize,
    pub(crate) issues: Vec<SourceIssue>,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/sources/validate", post(validate_sources_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };
    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Validates a catalog posted as raw YAML. Unparseable YAML (including
/// duplicate keys) is a 400; a parsed catalog always yields a report, with
/// unrecognised keys listed as issues.
pub(crate) async fn validate_sources_endpoint(
    body: String,
) -> Result<Json<SourceValidationResponse>, AppError> {
    let catalog = SourceCatalog::from_yaml_str(&body)?;
    let report = catalog.validate();
    Ok(Json(SourceValidationResponse {
        valid: report.is_valid(),
        urls_checked: report.urls_checked,
        issues: report.issues,
    }))
}
