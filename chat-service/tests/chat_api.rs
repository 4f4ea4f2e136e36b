//! Integration tests for the chat API.
//!
//! Uses the mock chat provider; requires PostgreSQL (SKIP_DB_TESTS skips).

mod common;

use common::{skip_db_tests, TestApp};
use reqwest::Client;
use serde_json::json;

async fn post_chat(
    client: &Client,
    address: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/v1/chat", address))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn chat_turn_returns_response_and_conversation_id() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = post_chat(
        &client,
        &app.address,
        json!({ "message": "What fertilizer should I use?" }),
    )
    .await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["status"], "success");
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("Mock response"));
    assert!(!body["conversation_id"].as_str().unwrap().is_empty());
    assert_eq!(body["metadata"]["model_used"], "mock-chat");
}

#[tokio::test]
async fn chat_uses_catalog_context_for_crop_and_problem() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    app.seed_product("SoftCal", "Field Tobacco", "Soil", "Soil Salinity")
        .await;
    let client = Client::new();

    let response = post_chat(
        &client,
        &app.address,
        json!({ "message": "My tobacco has soil salinity problems" }),
    )
    .await;

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["metadata"]["products_count"], 1);
    assert_eq!(body["context_used"][0]["product_name"], "SoftCal");
    assert_eq!(
        body["metadata"]["context_extracted"]["crop"],
        "Field Tobacco"
    );
    assert_eq!(
        body["metadata"]["context_extracted"]["problem"],
        "Soil Salinity"
    );
}

#[tokio::test]
async fn conversation_context_accumulates_across_turns() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    app.seed_product("SoftCal", "Potatoes", "Soil", "Soil Acidity")
        .await;
    let client = Client::new();

    let first: serde_json::Value = post_chat(
        &client,
        &app.address,
        json!({ "message": "I grow potatoes", "conversation_id": "conv-accumulate" }),
    )
    .await
    .json()
    .await
    .unwrap();
    // Crop-only turn: the service asks for detail instead of recommending.
    assert_eq!(first["metadata"]["products_count"], 0);

    let second: serde_json::Value = post_chat(
        &client,
        &app.address,
        json!({ "message": "the problem is acid soil", "conversation_id": "conv-accumulate" }),
    )
    .await
    .json()
    .await
    .unwrap();

    // The crop from turn one combines with the new problem.
    assert_eq!(
        second["metadata"]["combined_context"]["crop"],
        "Potatoes"
    );
    assert_eq!(
        second["metadata"]["combined_context"]["problem"],
        "Soil Acidity"
    );
    assert_eq!(second["metadata"]["products_count"], 1);
    assert!(second["metadata"]["history_count"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn caller_supplied_context_overrides_extraction() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let body: serde_json::Value = post_chat(
        &client,
        &app.address,
        json!({
            "message": "I grow potatoes",
            "user_context": { "crop_type": "Field Tobacco", "problem": "Soil Salinity" }
        }),
    )
    .await
    .json()
    .await
    .unwrap();

    assert_eq!(
        body["metadata"]["combined_context"]["crop"],
        "Field Tobacco"
    );
    assert_eq!(
        body["metadata"]["combined_context"]["problem"],
        "Soil Salinity"
    );
}

#[tokio::test]
async fn invalid_conversation_id_is_rejected() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = post_chat(
        &client,
        &app.address,
        json!({ "message": "hello", "conversation_id": "bad id!" }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn oversized_message_is_rejected() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = post_chat(
        &client,
        &app.address,
        json!({ "message": "a".repeat(1001) }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn dangerous_content_is_rejected() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = post_chat(
        &client,
        &app.address,
        json!({ "message": "<script>alert(1)</script>" }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn provider_failure_degrades_to_fallback() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    app.mock.set_failing(true);
    let client = Client::new();

    let response = post_chat(&client, &app.address, json!({ "message": "hello" })).await;

    // Upstream failure still answers the caller.
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "partial");
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("technical difficulties"));

    // The breaker is now open; recovery requires reset or cooldown.
    app.mock.set_failing(false);
    let body: serde_json::Value = post_chat(&client, &app.address, json!({ "message": "hello" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "partial");
}

#[tokio::test]
async fn session_and_history_round_trip() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    for message in ["first message", "second message"] {
        post_chat(
            &client,
            &app.address,
            json!({ "message": message, "conversation_id": "conv-roundtrip" }),
        )
        .await;
    }

    let session: serde_json::Value = client
        .get(format!("{}/api/v1/session/conv-roundtrip", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["session_active"], true);
    assert_eq!(session["message_count"], 2);

    let history: serde_json::Value = client
        .get(format!("{}/api/v1/conversations/conv-roundtrip", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user_message"], "second message");

    let listing: serde_json::Value = client
        .get(format!("{}/api/v1/conversations", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listing
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["conversation_id"] == "conv-roundtrip"));
}

#[tokio::test]
async fn delete_conversation_removes_history() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn().await;
    let client = Client::new();

    post_chat(
        &client,
        &app.address,
        json!({ "message": "to be deleted", "conversation_id": "conv-delete" }),
    )
    .await;

    let response = client
        .delete(format!("{}/api/v1/conversations/conv-delete", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // A second delete finds nothing.
    let response = client
        .delete(format!("{}/api/v1/conversations/conv-delete", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn rate_limit_rejects_after_burst() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.requests = 2;
        config.rate_limit.window_seconds = 3600;
    })
    .await;
    let client = Client::new();

    for _ in 0..2 {
        let response = client
            .get(format!("{}/api/crops", app.address))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let response = client
        .get(format!("{}/api/crops", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 429);
    assert!(response.headers().contains_key("retry-after"));

    // Health stays reachable under rate limiting.
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn api_auth_guards_chat_when_enabled() {
    if skip_db_tests() {
        return;
    }

    let app = TestApp::spawn_with(|config| {
        config.security.enable_api_auth = true;
        config.security.api_secret_key = "chat-secret".to_string();
    })
    .await;
    let client = Client::new();

    let response = post_chat(&client, &app.address, json!({ "message": "hello" })).await;
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .post(format!("{}/api/v1/chat", app.address))
        .bearer_auth("chat-secret")
        .json(&json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}
