//! HTTP handlers.

pub mod admin;
pub mod chat;
pub mod products;

use crate::services::metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub database_connected: bool,
    pub llm_configured: bool,
    pub circuit_breaker_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_llm_failure: Option<DateTime<Utc>>,
}

/// Root banner.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Chat service is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
    }))
}

/// Health check for monitoring.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_connected = state.db.health_check().await.is_ok();
    let circuit_breaker_open = state.llm.is_circuit_open();

    let status = if !database_connected || circuit_breaker_open {
        "degraded"
    } else {
        "healthy"
    };

    let code = if database_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            database_connected,
            llm_configured: state.llm.is_configured(),
            circuit_breaker_open,
            last_llm_failure: state.llm.last_failure(),
        }),
    )
}

/// Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::get_metrics(),
    )
}
