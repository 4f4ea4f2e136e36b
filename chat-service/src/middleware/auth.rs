//! API key authentication middleware.

use crate::startup::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;

const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

fn keys_match(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Guard for `/admin/*` routes. Requires `X-Admin-Api-Key`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if keys_match(key, &state.config.security.admin_api_key) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Failed admin authentication attempt");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized: Invalid or missing admin API key" })),
            )
                .into_response()
        }
    }
}

/// Optional bearer-key guard for the chat API, active when
/// `ENABLE_API_AUTH` is set.
pub async fn api_key_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.security.enable_api_auth {
        return next.run(request).await;
    }

    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match bearer {
        Some(key) if keys_match(key, &state.config.security.api_secret_key) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Invalid API key attempt");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid API key" })),
            )
                .into_response()
        }
    }
}
