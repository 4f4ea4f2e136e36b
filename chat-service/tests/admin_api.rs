//! Integration tests for the authenticated admin endpoints.

mod common;

use common::{skip_db_tests, TestApp, TEST_ADMIN_KEY};
use reqwest::Client;
use serde_json::json;

#[tokio::test]
async fn admin_routes_require_api_key() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/admin/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/admin/health", app.address))
        .header("X-Admin-Api-Key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/admin/health", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn analytics_reflect_recorded_traffic() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    client
        .post(format!("{}/api/v1/chat", app.address))
        .json(&json!({ "message": "hello there" }))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{}/admin/analytics?hours=1", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let analytics = &body["analytics"];
    assert!(analytics["total_requests"].as_i64().unwrap() >= 1);
    assert!(analytics["endpoint_usage"]["/api/v1/chat"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn clear_metrics_resets_analytics() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    client
        .get(format!("{}/api/crops", app.address))
        .send()
        .await
        .unwrap();

    client
        .post(format!("{}/admin/clear-metrics", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{}/admin/analytics?hours=1", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Only the analytics request itself can have landed since the clear.
    assert!(body["analytics"]["total_requests"].as_i64().unwrap() <= 1);
}

#[tokio::test]
async fn reset_circuit_breaker_recovers_from_failures() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    // Open the breaker with a failing provider.
    app.mock.set_failing(true);
    client
        .post(format!("{}/api/v1/chat", app.address))
        .json(&json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();

    let health: serde_json::Value = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["circuit_breaker_open"], true);
    assert_eq!(health["status"], "degraded");

    // Reset and verify recovery.
    app.mock.set_failing(false);
    let body: serde_json::Value = client
        .post(format!("{}/admin/reset-circuit-breaker", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["circuit_breaker_open"], false);

    let chat: serde_json::Value = client
        .post(format!("{}/api/v1/chat", app.address))
        .json(&json!({ "message": "hello again" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chat["status"], "success");
}

#[tokio::test]
async fn config_endpoint_hides_secrets() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/admin/config", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body = response.text().await.unwrap();
    assert!(!body.contains(TEST_ADMIN_KEY));
    assert!(!body.contains("test-api-key"));
    assert!(body.contains("rate_limiting"));
}

#[tokio::test]
async fn status_endpoint_reports_database_and_llm() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let body: serde_json::Value = client
        .get(format!("{}/admin/status", app.address))
        .header("X-Admin-Api-Key", TEST_ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["database"]["status"], "connected");
    assert_eq!(body["llm_service"]["status"], "connected");
    assert_eq!(body["circuit_breaker_open"], false);
    assert_eq!(body["catalog"]["crops"], 0);
}
