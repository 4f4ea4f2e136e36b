//! Integration tests for health and observability endpoints.
//!
//! These tests require PostgreSQL; set SKIP_DB_TESTS to skip them.
//! Run with: cargo test -p chat-service --test health_check

mod common;

use common::{skip_db_tests, TestApp};
use reqwest::Client;
use std::time::Duration;

#[tokio::test]
async fn health_check_returns_healthy_with_database() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database_connected"], true);
    assert_eq!(body["llm_configured"], true);
    assert_eq!(body["circuit_breaker_open"], false);
}

#[tokio::test]
async fn root_returns_service_banner() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_text() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    // Generate at least one request first.
    client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("chat_http_requests_total"));
}

#[tokio::test]
async fn responses_carry_security_and_request_id_headers() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to send request");

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}
