//! HttpBackendClient against a mock HTTP backend

use std::time::Duration;

use mcpbridge_core::{
    BackendAuthClient, BackendConfig, BackendError, BackendHandle, CompletionStatus,
    StartAuthRequest,
};
use mcpbridge_gateway::HttpBackendClient;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpBackendClient {
    HttpBackendClient::new(&BackendConfig {
        base_url: server.uri(),
        start_path: "/auth/start".to_string(),
        status_path: "/auth/status".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

fn start_request() -> StartAuthRequest {
    StartAuthRequest {
        account: Some("alice@example.com".to_string()),
        client_id: "client-1".to_string(),
    }
}

async fn status_answer(body: serde_json::Value) -> Result<CompletionStatus, BackendError> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/status"))
        .and(query_param("handle", "h-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    client_for(&server)
        .check_completion(&BackendHandle::new("h-1"))
        .await
}

#[tokio::test]
async fn test_start_auth_sends_account_and_parses_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/start"))
        .and(body_json(json!({
            "account": "alice@example.com",
            "client_id": "client-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "handle": "h-1",
            "auth_url": "https://backend.test/approve/h-1",
            "expires_in": 300,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let attempt = client_for(&server)
        .start_auth(&start_request())
        .await
        .unwrap();

    assert_eq!(attempt.handle.as_str(), "h-1");
    assert_eq!(attempt.auth_url, "https://backend.test/approve/h-1");
    assert!(attempt.expires_at.is_some());
}

#[tokio::test]
async fn test_start_auth_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/start"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .start_auth(&start_request())
        .await
        .unwrap_err();
    assert_eq!(
        error,
        BackendError::Api {
            status: 503,
            message: "maintenance".to_string(),
        }
    );
}

#[tokio::test]
async fn test_long_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/start"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(10_000)))
        .mount(&server)
        .await;

    let Err(BackendError::Api { message, .. }) =
        client_for(&server).start_auth(&start_request()).await
    else {
        panic!("expected api error");
    };
    assert!(message.len() <= 256);
}

#[tokio::test]
async fn test_status_pending_and_expired() {
    assert!(matches!(
        status_answer(json!({ "status": "pending" })).await,
        Ok(CompletionStatus::Pending)
    ));
    assert!(matches!(
        status_answer(json!({ "status": "expired" })).await,
        Ok(CompletionStatus::Expired)
    ));
}

#[tokio::test]
async fn test_status_authorized_carries_credential() {
    let status = status_answer(json!({
        "status": "authorized",
        "credential": "backend-secret",
        "subject": "alice",
    }))
    .await;

    let Ok(CompletionStatus::Authorized(credential)) = status else {
        panic!("expected authorized, got {status:?}");
    };
    assert_eq!(credential.secret, "backend-secret");
    assert_eq!(credential.subject.as_deref(), Some("alice"));
    assert!(credential.expires_at.is_none());
}

#[tokio::test]
async fn test_status_denied_keeps_reason() {
    let status = status_answer(json!({ "status": "denied", "reason": "user cancelled" })).await;
    let Ok(CompletionStatus::Denied { reason }) = status else {
        panic!("expected denied");
    };
    assert_eq!(reason.as_deref(), Some("user cancelled"));
}

#[tokio::test]
async fn test_status_invalid_responses() {
    assert!(matches!(
        status_answer(json!({ "status": "authorized" })).await,
        Err(BackendError::InvalidResponse(_))
    ));
    assert!(matches!(
        status_answer(json!({ "status": "bogus" })).await,
        Err(BackendError::InvalidResponse(_))
    ));
    assert!(matches!(
        status_answer(json!({ "unexpected": true })).await,
        Err(BackendError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    // Nothing listens on port 1
    let client = HttpBackendClient::new(&BackendConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..BackendConfig::default()
    })
    .unwrap();

    let result = client.check_completion(&BackendHandle::new("h-1")).await;
    assert!(matches!(result, Err(BackendError::Transport(_))), "{result:?}");
}

#[tokio::test]
async fn test_slow_backend_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "pending" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = HttpBackendClient::new(&BackendConfig {
        base_url: server.uri(),
        start_path: "/auth/start".to_string(),
        status_path: "/auth/status".to_string(),
        timeout: Duration::from_millis(200),
    })
    .unwrap();

    let result = client.check_completion(&BackendHandle::new("h-1")).await;
    assert!(matches!(result, Err(BackendError::Transport(_))), "{result:?}");
}

#[tokio::test]
async fn test_unrepresentable_expiry_is_invalid_response() {
    let status = status_answer(json!({
        "status": "authorized",
        "credential": "backend-secret",
        "expires_in": i64::MAX,
    }))
    .await;
    assert!(matches!(status, Err(BackendError::InvalidResponse(_))), "{status:?}");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "handle": "h-1",
            "auth_url": "https://backend.test/approve/h-1",
            "expires_in": i64::MAX,
        })))
        .mount(&server)
        .await;
    let result = client_for(&server).start_auth(&start_request()).await;
    assert!(matches!(result, Err(BackendError::InvalidResponse(_))), "{result:?}");
}
