//! Per-request metrics recording.
//!
//! Feeds both the Prometheus registry and the in-memory monitor that backs
//! the admin analytics endpoints.

use crate::services::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};
use crate::startup::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub async fn request_metrics_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Use the route template when available to keep label cardinality
    // bounded; the monitor keeps the raw path for analytics.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &route, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .observe(duration);

    state.monitor.record(&path, &method, status, duration);

    response
}
