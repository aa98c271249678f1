//! Authorization code flow end to end

use axum::http::{header, StatusCode};
use mcpbridge_core::{AuthorizeMode, BackendError, CompletionStatus};
use pretty_assertions::assert_eq;
use tests::{
    advance, authorize_uri, authorized, hidden_field, redirect_param, ScriptedBackend,
    TestGateway, CLIENT_ID, CLIENT_STATE, POLL_INTERVAL, POLL_TIMEOUT, REDIRECT_URI,
};

#[tokio::test]
async fn test_authorize_without_client_id_names_it() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let response = gateway
        .get("/authorize?response_type=code&redirect_uri=http%3A%2F%2Flocalhost%3A9999%2Fcallback&state=abc")
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["error"], "invalid_request");
    assert!(body["error_description"]
        .as_str()
        .unwrap()
        .contains("client_id"));
    assert_eq!(gateway.backend.start_calls(), 0);
}

#[tokio::test]
async fn test_authorize_without_state_or_redirect_is_rejected() {
    let gateway = TestGateway::new(ScriptedBackend::new());

    let response = gateway
        .get("/authorize?client_id=c1&redirect_uri=http%3A%2F%2Flocalhost%2Fcb")
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("state"));

    let response = gateway.get("/authorize?client_id=c1&state=s").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("redirect_uri"));
}

#[tokio::test]
async fn test_unsupported_response_type() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let uri = authorize_uri().replace("response_type=code", "response_type=token");
    let response = gateway.get(&uri).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "unsupported_response_type");
}

#[tokio::test]
async fn test_authorize_renders_csrf_form() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let response = gateway.get(&authorize_uri()).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .header(header::CONTENT_TYPE)
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));

    let csrf = hidden_field(&response.body, "csrf_state").unwrap();
    assert!(csrf.starts_with("csrf_"));
    assert_eq!(
        hidden_field(&response.body, "client_state").as_deref(),
        Some(CLIENT_STATE)
    );
    assert_eq!(
        hidden_field(&response.body, "client_id").as_deref(),
        Some(CLIENT_ID)
    );
    // Rendering the form does not contact the backend
    assert_eq!(gateway.backend.start_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_happy_path() {
    let gateway = TestGateway::new(
        ScriptedBackend::new()
            .then(CompletionStatus::Pending)
            .then(authorized()),
    );

    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();
    let redirect = gateway
        .post_form(
            "/authorize",
            &[
                ("client_id", CLIENT_ID),
                ("csrf_state", &csrf),
                ("client_state", CLIENT_STATE),
                ("account", "alice@example.com"),
            ],
        )
        .await;

    assert_eq!(redirect.status, StatusCode::FOUND);
    let location = redirect.header(header::LOCATION).unwrap();
    assert!(location.starts_with(REDIRECT_URI));
    assert_eq!(
        redirect_param(&redirect, "state").as_deref(),
        Some(CLIENT_STATE)
    );
    let code = redirect_param(&redirect, "code").unwrap();
    assert!(code.starts_with("mbc_"));

    assert_eq!(
        gateway.backend.accounts(),
        vec![Some("alice@example.com".to_string())]
    );
    assert_eq!(
        gateway.launcher.urls(),
        vec!["https://backend.test/login?attempt=1".to_string()]
    );

    // Second poll returns the credential
    advance(POLL_INTERVAL * 3).await;
    assert_eq!(gateway.backend.check_calls(), 2);

    let token = gateway.exchange(&code).await;
    assert_eq!(token.status, StatusCode::OK, "{}", token.body);
    assert_eq!(token.header(header::CACHE_CONTROL), Some("no-store"));
    let body = token.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "mcp");
    let access_token = body["access_token"].as_str().unwrap().to_string();
    assert!(access_token.starts_with("tok_"));

    let protected = gateway.get_with_bearer("/mcp", &access_token).await;
    assert_eq!(protected.status, StatusCode::OK, "{}", protected.body);
    assert_eq!(protected.json()["client_id"], CLIENT_ID);
    assert_eq!(protected.json()["subject"], "alice");
}

#[tokio::test(start_paused = true)]
async fn test_token_before_backend_completes_is_pending() {
    let gateway = TestGateway::new(ScriptedBackend::new().then(authorized()));
    let code = gateway.authorize().await;

    // No poll has happened yet
    let response = gateway.exchange(&code).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "authorization_pending");

    // Pending does not burn the code
    advance(POLL_INTERVAL * 2).await;
    let response = gateway.exchange(&code).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
}

#[tokio::test(start_paused = true)]
async fn test_consumed_code_is_invalid_grant() {
    let gateway = TestGateway::new(ScriptedBackend::new().then(authorized()));
    let code = gateway.authorize().await;
    advance(POLL_INTERVAL * 2).await;

    let first = gateway.exchange(&code).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = gateway.exchange(&code).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.json()["error"], "invalid_grant");
}

#[tokio::test(start_paused = true)]
async fn test_backend_never_finishes_expires_and_stops_polling() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let code = gateway.authorize().await;

    advance(POLL_TIMEOUT + POLL_INTERVAL * 2).await;
    let response = gateway.exchange(&code).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_grant");

    let calls = gateway.backend.check_calls();
    assert!(calls > 0);
    advance(POLL_TIMEOUT).await;
    assert_eq!(gateway.backend.check_calls(), calls);
    assert_eq!(gateway.server.authorizer().active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_backend_denial_is_access_denied() {
    let gateway = TestGateway::new(ScriptedBackend::new().then(CompletionStatus::Denied {
        reason: Some("user cancelled".to_string()),
    }));
    let code = gateway.authorize().await;
    advance(POLL_INTERVAL * 2).await;

    let response = gateway.exchange(&code).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "access_denied");

    let again = gateway.exchange(&code).await;
    assert_eq!(again.json()["error"], "invalid_grant");
}

#[tokio::test(start_paused = true)]
async fn test_backend_errors_keep_session_pending() {
    let gateway = TestGateway::new(
        ScriptedBackend::new()
            .then_error(BackendError::Transport("connection refused".to_string()))
            .then_error(BackendError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            })
            .then(authorized()),
    );
    let code = gateway.authorize().await;

    advance(POLL_INTERVAL * 2 + POLL_INTERVAL / 2).await;
    assert_eq!(gateway.exchange(&code).await.json()["error"], "authorization_pending");

    advance(POLL_INTERVAL).await;
    let response = gateway.exchange(&code).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
}

#[tokio::test]
async fn test_csrf_token_is_one_shot() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();
    let fields = [
        ("client_id", CLIENT_ID),
        ("csrf_state", csrf.as_str()),
        ("client_state", CLIENT_STATE),
        ("account", "alice"),
    ];

    let first = gateway.post_form("/authorize", &fields).await;
    assert_eq!(first.status, StatusCode::FOUND);

    let replay = gateway.post_form("/authorize", &fields).await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.json()["error"], "invalid_request");
    assert_eq!(gateway.backend.start_calls(), 1);
    assert_eq!(gateway.dependencies.session_store.len(), 1);
}

#[tokio::test]
async fn test_csrf_state_mismatch_creates_no_session() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();

    let response = gateway
        .post_form(
            "/authorize",
            &[
                ("client_id", CLIENT_ID),
                ("csrf_state", &csrf),
                ("client_state", "forged"),
                ("account", "alice"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(gateway.dependencies.session_store.is_empty());
    assert_eq!(gateway.backend.start_calls(), 0);
}

#[tokio::test]
async fn test_post_authorize_ignores_query_string() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();

    let uri = format!(
        "/authorize?client_id={CLIENT_ID}&csrf_state={csrf}&client_state={CLIENT_STATE}"
    );
    let response = gateway.post_form(&uri, &[("account", "alice")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("client_id"));
    assert!(gateway.dependencies.session_store.is_empty());

    // The CSRF token was never touched and still works from the body
    let response = gateway
        .post_form(
            "/authorize",
            &[
                ("client_id", CLIENT_ID),
                ("csrf_state", &csrf),
                ("client_state", CLIENT_STATE),
                ("account", "alice"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND);
}

#[tokio::test]
async fn test_form_client_id_must_match_request() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();

    let response = gateway
        .post_form(
            "/authorize",
            &[
                ("client_id", "someone-else"),
                ("csrf_state", &csrf),
                ("client_state", CLIENT_STATE),
                ("account", "alice"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(gateway.dependencies.session_store.is_empty());
}

#[tokio::test]
async fn test_backend_start_failure_is_temporarily_unavailable() {
    let gateway = TestGateway::new(ScriptedBackend::new());
    gateway
        .backend
        .fail_next_start(BackendError::Transport("connection refused".to_string()));

    let page = gateway.get(&authorize_uri()).await;
    let csrf = hidden_field(&page.body, "csrf_state").unwrap();
    let response = gateway
        .post_form(
            "/authorize",
            &[
                ("client_id", CLIENT_ID),
                ("csrf_state", &csrf),
                ("client_state", CLIENT_STATE),
                ("account", "alice"),
            ],
        )
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json()["error"], "temporarily_unavailable");
    assert!(!response.body.contains("connection refused"));
    assert!(gateway.dependencies.session_store.is_empty());
    assert_eq!(gateway.server.authorizer().active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_direct_mode_redirects_immediately() {
    let mut config = tests::test_config();
    config.authorize_mode = AuthorizeMode::Direct;
    let gateway = TestGateway::with_config(config, ScriptedBackend::new().then(authorized()));

    let response = gateway.get(&format!("{}&account=bob", authorize_uri())).await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.header(header::CACHE_CONTROL), Some("no-store"));
    let code = redirect_param(&response, "code").unwrap();
    assert_eq!(gateway.backend.accounts(), vec![Some("bob".to_string())]);
    assert_eq!(gateway.launcher.urls().len(), 1);

    advance(POLL_INTERVAL * 2).await;
    assert_eq!(gateway.exchange(&code).await.status, StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_are_independent() {
    let gateway = TestGateway::new(
        ScriptedBackend::new()
            .then(CompletionStatus::Denied { reason: None })
            .then(authorized()),
    );
    let first = gateway.authorize().await;
    let second = gateway.authorize().await;
    advance(POLL_INTERVAL * 2).await;

    let outcomes = [
        gateway.exchange(&first).await.status,
        gateway.exchange(&second).await.status,
    ];
    // Worker order is not fixed; one denial and one success either way
    assert!(outcomes.contains(&StatusCode::OK));
    assert!(outcomes.contains(&StatusCode::BAD_REQUEST));
}

#[tokio::test(start_paused = true)]
async fn test_backend_attempt_lifetime_bounds_the_session() {
    let lifetime = std::time::Duration::from_millis(500);
    let gateway = TestGateway::new(ScriptedBackend::new().with_attempt_lifetime(lifetime));
    let code = gateway.authorize().await;

    let session = gateway
        .dependencies
        .session_store
        .get(&mcpbridge_core::AuthorizationCode::new(code.as_str()))
        .unwrap();
    assert!(session.expires_at <= session.created_at + chrono::Duration::milliseconds(500));

    advance(POLL_INTERVAL * 2).await;
    assert_eq!(gateway.exchange(&code).await.json()["error"], "authorization_pending");

    // Well before the poll timeout, the backend's own deadline ends polling
    advance(lifetime).await;
    assert!(lifetime * 2 < POLL_TIMEOUT);
    assert_eq!(gateway.server.authorizer().active_workers(), 0);
    assert_eq!(gateway.exchange(&code).await.json()["error"], "invalid_grant");
}
