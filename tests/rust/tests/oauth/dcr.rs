//! Dynamic Client Registration and registered-client enforcement

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::{hidden_field, test_config, ScriptedBackend, TestGateway, CLIENT_STATE};

fn authorize_uri_for(client_id: &str, redirect_uri: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", CLIENT_STATE)
        .finish();
    format!("/authorize?{query}")
}

#[tokio::test]
async fn test_register_client() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let response = gateway
        .post_json(
            "/register",
            json!({
                "client_name": "Test Client",
                "redirect_uris": ["http://localhost:7000/cb"],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let body = response.json();
    assert!(body["client_id"].as_str().unwrap().starts_with("client_"));
    assert_eq!(body["client_name"], "Test Client");
    assert_eq!(body["redirect_uris"], json!(["http://localhost:7000/cb"]));
    assert_eq!(body["grant_types"], json!(["authorization_code"]));
    assert_eq!(body["token_endpoint_auth_method"], "none");
}

#[tokio::test]
async fn test_register_requires_redirect_uris() {
    let gateway = TestGateway::new(ScriptedBackend::new());

    let response = gateway
        .post_json("/register", json!({ "client_name": "No Redirects" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_redirect_uri");

    let response = gateway
        .post_json("/register", json!({ "redirect_uris": ["not a url"] }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_redirect_uri");
}

#[tokio::test]
async fn test_register_rejects_malformed_body() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let response = gateway
        .post_json("/register", json!({ "redirect_uris": "http://localhost/cb" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_client_metadata");
}

#[tokio::test]
async fn test_registered_redirect_is_enforced() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let client_id = gateway
        .post_json(
            "/register",
            json!({ "redirect_uris": ["http://localhost:7000/cb"] }),
        )
        .await
        .json()["client_id"]
        .as_str()
        .unwrap()
        .to_string();

    let ok = gateway
        .get(&authorize_uri_for(&client_id, "http://localhost:7000/cb"))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(hidden_field(&ok.body, "csrf_state").is_some());

    let rejected = gateway
        .get(&authorize_uri_for(&client_id, "http://evil.test/cb"))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.json()["error"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_client_rejected_when_registration_required() {
    let mut config = test_config();
    config.require_registered_clients = true;
    let gateway = TestGateway::with_config(config, ScriptedBackend::new());

    let response = gateway
        .get(&authorize_uri_for("never-registered", "http://localhost:7000/cb"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "invalid_client");
}

#[tokio::test]
async fn test_registration_is_rate_limited() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let body = json!({ "redirect_uris": ["http://localhost:7000/cb"] });

    for _ in 0..20 {
        let response = gateway.post_json("/register", body.clone()).await;
        assert_eq!(response.status, StatusCode::CREATED);
    }
    let limited = gateway.post_json("/register", body).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json()["error"], "slow_down");
}

#[tokio::test]
async fn test_token_polling_budget_is_per_code() {
    let mut config = test_config();
    config.rate_limit.token_per_code = 5;
    let gateway = TestGateway::with_config(config, ScriptedBackend::new());
    let busy = gateway.authorize().await;
    let quiet = gateway.authorize().await;

    for _ in 0..5 {
        let response = gateway.exchange(&busy).await;
        assert_eq!(response.json()["error"], "authorization_pending");
    }
    let limited = gateway.exchange(&busy).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.json()["error"], "slow_down");

    // Another client's first poll is answered on its own merits
    let response = gateway.exchange(&quiet).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "authorization_pending");
}

#[tokio::test]
async fn test_oversized_body_is_refused_before_buffering() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let body = json!({
        "redirect_uris": ["http://localhost:7000/cb"],
        "client_name": "x".repeat(2 * 1024 * 1024),
    });

    let response = gateway.post_json("/register", body).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);

    let small = json!({ "redirect_uris": ["http://localhost:7000/cb"] });
    let response = gateway.post_json("/register", small).await;
    assert_eq!(response.status, StatusCode::CREATED);
}
