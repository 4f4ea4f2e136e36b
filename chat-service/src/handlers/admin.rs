//! Authenticated admin and monitoring handlers.

use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    #[serde(default = "default_window_hours")]
    pub hours: i64,
}

fn default_window_hours() -> i64 {
    24
}

/// Process health snapshot from the request monitor.
///
/// GET /admin/health
#[instrument(skip(state))]
pub async fn system_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.monitor.health_snapshot();
    let error_rate = snapshot["error_rate"].as_f64().unwrap_or(0.0);

    Json(json!({
        "status": if error_rate < 0.5 { "healthy" } else { "warning" },
        "timestamp": Utc::now(),
        "metrics": snapshot,
    }))
}

/// Usage analytics over a time window.
///
/// GET /admin/analytics?hours=24
#[instrument(skip(state))]
pub async fn usage_analytics(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<serde_json::Value> {
    let hours = query.hours.clamp(1, 24 * 30);
    Json(json!({
        "analytics": state.monitor.usage_analytics(hours),
        "generated_at": Utc::now(),
    }))
}

/// Error summary over a time window.
///
/// GET /admin/errors?hours=24
#[instrument(skip(state))]
pub async fn error_summary(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<serde_json::Value> {
    let hours = query.hours.clamp(1, 24 * 30);
    Json(json!({
        "error_summary": state.monitor.error_summary(hours),
        "generated_at": Utc::now(),
    }))
}

/// Non-sensitive configuration subset for debugging.
///
/// GET /admin/config
#[instrument(skip(state))]
pub async fn system_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(json!({
        "configuration": {
            "environment": format!("{:?}", config.environment).to_lowercase(),
            "api_version": env!("CARGO_PKG_VERSION"),
            "rate_limiting": {
                "enabled": config.rate_limit.enabled,
                "requests_per_window": config.rate_limit.requests,
                "window_seconds": config.rate_limit.window_seconds,
            },
            "security": {
                "api_auth_enabled": config.security.enable_api_auth,
            },
            "validation": {
                "max_message_length": config.validation.max_message_length,
            },
            "llm_configured": config.is_llm_configured(),
            "model": config.openai.model,
        },
        "timestamp": Utc::now(),
    }))
}

/// Database and LLM connectivity status.
///
/// GET /admin/status
#[instrument(skip(state))]
pub async fn system_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match state.db.database_info().await {
        Ok(info) => info,
        Err(e) => json!({ "status": "error", "error": e.to_string() }),
    };

    let catalog = catalog_dimensions(&state).await;

    Json(json!({
        "timestamp": Utc::now(),
        "database": database,
        "catalog": catalog,
        "llm_service": state.llm.test_connectivity().await,
        "circuit_breaker_open": state.llm.is_circuit_open(),
        "last_failure": state.llm.last_failure(),
    }))
}

/// Distinct catalog dimensions, for sanity-checking the product import.
async fn catalog_dimensions(state: &AppState) -> serde_json::Value {
    let crops = state.db.list_crops().await.map(|v| v.len());
    let problems = state.db.list_problems().await.map(|v| v.len());
    let application_types = state.db.list_application_types().await.map(|v| v.len());
    let growth_stages = state.db.list_growth_stages().await.map(|v| v.len());

    match (crops, problems, application_types, growth_stages) {
        (Ok(crops), Ok(problems), Ok(application_types), Ok(growth_stages)) => json!({
            "crops": crops,
            "problems": problems,
            "application_types": application_types,
            "growth_stages": growth_stages,
        }),
        _ => json!({ "status": "error" }),
    }
}

/// Reset collected request metrics.
///
/// POST /admin/clear-metrics
#[instrument(skip(state))]
pub async fn clear_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.monitor.clear();
    tracing::info!("Request metrics cleared by admin");

    Json(json!({
        "status": "success",
        "message": "Request metrics cleared",
        "timestamp": Utc::now(),
    }))
}

/// Close the LLM circuit breaker so requests go upstream again.
///
/// POST /admin/reset-circuit-breaker
#[instrument(skip(state))]
pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.llm.reset_circuit_breaker();

    Ok(Json(json!({
        "status": "success",
        "message": "Circuit breaker reset successfully",
        "circuit_breaker_open": state.llm.is_circuit_open(),
    })))
}
