//! BackgroundAuthorizer liveness and termination, on paused time

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpbridge_core::{
    AuthorizeRequest, BackendAttempt, BackendAuthClient, BackendError, BackendHandle,
    CompletionStatus, PollingConfig, SessionStatus, SessionStore, StartAuthRequest, TokenStore,
};
use mcpbridge_gateway::{
    AuthorizationOutcome, BackgroundAuthorizer, InMemorySessionStore, InMemoryTokenStore,
    WorkerExit,
};
use pretty_assertions::assert_eq;
use tests::{authorized, ScriptedBackend};

const INTERVAL: Duration = Duration::from_millis(100);

fn polling() -> PollingConfig {
    PollingConfig {
        interval: INTERVAL,
        timeout: Duration::from_secs(1),
        request_timeout: Duration::from_millis(250),
    }
}

fn request(n: usize) -> AuthorizeRequest {
    AuthorizeRequest {
        client_id: format!("client-{n}"),
        redirect_uri: "http://localhost:9999/callback".to_string(),
        client_state: format!("state-{n}"),
        scope: None,
        resource: None,
        pkce: None,
    }
}

struct Harness {
    sessions: Arc<InMemorySessionStore>,
    tokens: Arc<InMemoryTokenStore>,
    authorizer: BackgroundAuthorizer,
}

impl Harness {
    fn new(backend: Arc<dyn BackendAuthClient>) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(300)));
        let tokens = Arc::new(InMemoryTokenStore::new(None));
        let authorizer = BackgroundAuthorizer::new(
            backend,
            sessions.clone(),
            tokens.clone(),
            polling(),
        );
        Self {
            sessions,
            tokens,
            authorizer,
        }
    }

    fn start(&self, n: usize) -> mcpbridge_core::AuthorizationCode {
        let code = self
            .sessions
            .create(request(n), BackendHandle::new(format!("handle-{n}")));
        self.authorizer.spawn(code.clone(), BackendHandle::new(format!("handle-{n}")));
        code
    }
}

async fn collect(
    rx: &mut tokio::sync::broadcast::Receiver<AuthorizationOutcome>,
    n: usize,
) -> Vec<AuthorizationOutcome> {
    let mut outcomes = Vec::with_capacity(n);
    while outcomes.len() < n {
        outcomes.push(rx.recv().await.unwrap());
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn test_many_sessions_authorize_independently() {
    let backend = Arc::new(ScriptedBackend::new().with_fallback(authorized()));
    let harness = Harness::new(backend.clone());
    let mut rx = harness.authorizer.subscribe();

    let codes: Vec<_> = (0..50).map(|n| harness.start(n)).collect();
    let outcomes = collect(&mut rx, codes.len()).await;

    assert!(outcomes.iter().all(|o| o.exit == WorkerExit::Authorized));
    assert_eq!(harness.authorizer.active_workers(), 0);
    assert_eq!(harness.tokens.len(), 50);
    assert_eq!(backend.check_calls(), 50);
    for code in &codes {
        assert_eq!(harness.sessions.status(code), Some(SessionStatus::Authorized));
    }
}

#[tokio::test(start_paused = true)]
async fn test_terminal_session_is_never_revisited() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .then(authorized())
            .with_fallback(CompletionStatus::Denied { reason: None }),
    );
    let harness = Harness::new(backend.clone());
    let code = harness.start(1);

    tokio::time::sleep(INTERVAL * 20).await;
    assert_eq!(harness.sessions.status(&code), Some(SessionStatus::Authorized));
    assert_eq!(backend.check_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backend_expiry_ends_session() {
    let backend = Arc::new(ScriptedBackend::new().then(CompletionStatus::Expired));
    let harness = Harness::new(backend);
    let mut rx = harness.authorizer.subscribe();
    let code = harness.start(1);

    let outcome = collect(&mut rx, 1).await.remove(0);
    assert_eq!(outcome.exit, WorkerExit::Expired);
    assert_eq!(harness.sessions.status(&code), Some(SessionStatus::Expired));
    assert!(harness.tokens.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_single_worker() {
    let backend = Arc::new(ScriptedBackend::new());
    let harness = Harness::new(backend.clone());
    let mut rx = harness.authorizer.subscribe();
    let first = harness.start(1);
    let second = harness.start(2);

    tokio::time::sleep(INTERVAL * 2).await;
    assert!(harness.authorizer.cancel(&first));

    let outcome = collect(&mut rx, 1).await.remove(0);
    assert_eq!(outcome.code, first);
    assert_eq!(outcome.exit, WorkerExit::Cancelled);
    // Cancelling polling is not a verdict on the session
    assert_eq!(harness.sessions.status(&first), Some(SessionStatus::Pending));
    assert_eq!(harness.authorizer.active_workers(), 1);

    let outcome = collect(&mut rx, 1).await.remove(0);
    assert_eq!(outcome.code, second);
    assert_eq!(outcome.exit, WorkerExit::Expired);
    assert!(!harness.authorizer.cancel(&second));
}

/// Backend whose status call never answers
struct HangingBackend;

#[async_trait]
impl BackendAuthClient for HangingBackend {
    async fn start_auth(&self, _request: &StartAuthRequest) -> Result<BackendAttempt, BackendError> {
        Err(BackendError::Transport("not used".to_string()))
    }

    async fn check_completion(
        &self,
        _handle: &BackendHandle,
    ) -> Result<CompletionStatus, BackendError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_hanging_backend_still_hits_deadline() {
    let harness = Harness::new(Arc::new(HangingBackend));
    let mut rx = harness.authorizer.subscribe();
    let code = harness.start(1);

    let started = tokio::time::Instant::now();
    let outcome = collect(&mut rx, 1).await.remove(0);

    assert_eq!(outcome.exit, WorkerExit::Expired);
    assert!(started.elapsed() <= polling().timeout + INTERVAL);
    assert_eq!(harness.sessions.status(&code), Some(SessionStatus::Expired));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_every_worker() {
    let harness = Harness::new(Arc::new(HangingBackend));
    for n in 0..10 {
        harness.start(n);
    }
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(harness.authorizer.active_workers(), 10);

    harness.authorizer.shutdown().await;
    assert_eq!(harness.authorizer.active_workers(), 0);

    // Spawning after shutdown never polls
    let code = harness.start(99);
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(harness.authorizer.active_workers(), 0);
    assert_eq!(harness.sessions.status(&code), Some(SessionStatus::Pending));
}

/// Backend whose status call panics
struct PanickingBackend;

#[async_trait]
impl BackendAuthClient for PanickingBackend {
    async fn start_auth(&self, _request: &StartAuthRequest) -> Result<BackendAttempt, BackendError> {
        Err(BackendError::Transport("not used".to_string()))
    }

    async fn check_completion(
        &self,
        _handle: &BackendHandle,
    ) -> Result<CompletionStatus, BackendError> {
        panic!("backend client bug")
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_worker_releases_its_entry() {
    let harness = Harness::new(Arc::new(PanickingBackend));
    harness.start(1);
    assert_eq!(harness.authorizer.active_workers(), 1);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(harness.authorizer.active_workers(), 0);

    // Shutdown is not held up by the dead worker
    harness.authorizer.shutdown().await;
}
