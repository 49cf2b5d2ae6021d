use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

use crate::AppState;

/// Liveness and database connectivity check.
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.db.health_check().await?;

    Ok(Json(json!({
        "status": "ok",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}

/// Prometheus metrics in text exposition format.
pub async fn metrics() -> impl IntoResponse {
    crate::services::metrics::get_metrics()
}
