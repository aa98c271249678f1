//! Background Authorizer
//!
//! One poll worker per Pending session. A worker asks the backend whether
//! the attempt completed, every `interval`, until it sees a terminal answer,
//! the poll deadline passes, the session disappears, or it is cancelled.
//! Backend errors are transient: they are logged and the next tick retries.
//!
//! Workers never outlive their session's Pending state, and a terminal
//! session never reverts.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mcpbridge_core::{
    AuthorizationCode, BackendAuthClient, BackendCredential, BackendHandle, CompletionStatus,
    PollingConfig, SessionError, SessionEvent, SessionStatus, SessionStore, TokenStore,
};
use tokio::sync::broadcast;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

/// How a poll worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Authorized,
    Failed,
    Expired,
    /// Session was consumed, burned or swept underneath the worker
    SessionGone,
    Cancelled,
}

impl From<SessionStatus> for WorkerExit {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Authorized => Self::Authorized,
            SessionStatus::Failed => Self::Failed,
            SessionStatus::Expired | SessionStatus::Pending => Self::Expired,
        }
    }
}

/// Emitted once per worker when it stops
#[derive(Debug, Clone)]
pub struct AuthorizationOutcome {
    pub code: AuthorizationCode,
    pub exit: WorkerExit,
}

/// Spawns and tracks poll workers
pub struct BackgroundAuthorizer {
    backend: Arc<dyn BackendAuthClient>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<dyn TokenStore>,
    config: PollingConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    workers: Arc<DashMap<String, CancellationToken>>,
    outcome_tx: broadcast::Sender<AuthorizationOutcome>,
}

impl BackgroundAuthorizer {
    pub fn new(
        backend: Arc<dyn BackendAuthClient>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<dyn TokenStore>,
        config: PollingConfig,
    ) -> Self {
        let (outcome_tx, _) = broadcast::channel(64);
        Self {
            backend,
            sessions,
            tokens,
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            workers: Arc::new(DashMap::new()),
            outcome_tx,
        }
    }

    /// Start polling for `code`
    ///
    /// After `shutdown` the worker is cancelled before its first poll.
    pub fn spawn(&self, code: AuthorizationCode, handle: BackendHandle) {
        self.spawn_within(code, handle, self.config.timeout);
    }

    /// Start polling for `code`, giving up after `max_wait` or the
    /// configured poll timeout, whichever is shorter
    pub fn spawn_within(&self, code: AuthorizationCode, handle: BackendHandle, max_wait: Duration) {
        let cancel = self.shutdown.child_token();
        // Registered before the task exists so a fast exit cannot leak it
        self.workers
            .insert(code.as_str().to_string(), cancel.clone());

        let worker = PollWorker {
            code: code.clone(),
            handle,
            backend: self.backend.clone(),
            sessions: self.sessions.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
            max_wait: max_wait.min(self.config.timeout),
            cancel,
        };
        let registration = Registration {
            workers: self.workers.clone(),
            code: code.clone(),
        };
        let outcome_tx = self.outcome_tx.clone();
        let span = info_span!("poll_worker", code = %code.redacted());

        self.tracker.spawn(
            async move {
                let exit = worker.run().await;
                drop(registration);
                debug!("[Authorizer] Worker stopped: {:?}", exit);
                // No receivers is fine
                let _ = outcome_tx.send(AuthorizationOutcome { code, exit });
            }
            .instrument(span),
        );
    }

    /// Stop the worker for `code`, if one is running
    pub fn cancel(&self, code: &AuthorizationCode) -> bool {
        match self.workers.get(code.as_str()) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Worker outcome events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthorizationOutcome> {
        self.outcome_tx.subscribe()
    }

    /// Cancel all workers and wait for them to stop
    pub async fn shutdown(&self) {
        info!(
            "[Authorizer] Shutting down {} poll workers",
            self.active_workers()
        );
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Removes the worker's entry when the task ends, panics included
struct Registration {
    workers: Arc<DashMap<String, CancellationToken>>,
    code: AuthorizationCode,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.workers.remove(self.code.as_str());
    }
}

struct PollWorker {
    code: AuthorizationCode,
    handle: BackendHandle,
    backend: Arc<dyn BackendAuthClient>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<dyn TokenStore>,
    config: PollingConfig,
    max_wait: Duration,
    cancel: CancellationToken,
}

impl PollWorker {
    async fn run(self) -> WorkerExit {
        let deadline = Instant::now() + self.max_wait;
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerExit::Cancelled,
                _ = sleep_until(deadline) => return self.finish(SessionEvent::DeadlineElapsed),
                _ = ticker.tick() => {}
            }

            match self.sessions.status(&self.code) {
                Some(SessionStatus::Pending) => {}
                Some(status) => {
                    debug!("[Authorizer] Session already {}, stopping", status);
                    return status.into();
                }
                None => return WorkerExit::SessionGone,
            }

            attempt += 1;
            let check = tokio::time::timeout(
                self.config.request_timeout,
                self.backend.check_completion(&self.handle),
            );
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerExit::Cancelled,
                _ = sleep_until(deadline) => return self.finish(SessionEvent::DeadlineElapsed),
                result = check => result,
            };

            match result {
                Err(_) => {
                    warn!(
                        "[Authorizer] Completion check #{} timed out after {:?}",
                        attempt, self.config.request_timeout
                    );
                }
                Ok(Err(e)) => {
                    warn!("[Authorizer] Completion check #{} failed: {}", attempt, e);
                }
                Ok(Ok(CompletionStatus::Pending)) => {
                    debug!("[Authorizer] Check #{}: still pending", attempt);
                }
                Ok(Ok(CompletionStatus::Authorized(credential))) => {
                    return self.authorize(credential);
                }
                Ok(Ok(CompletionStatus::Denied { reason })) => {
                    info!(
                        "[Authorizer] Backend denied the attempt: {}",
                        reason.as_deref().unwrap_or("no reason given")
                    );
                    return self.finish(SessionEvent::BackendDenied);
                }
                Ok(Ok(CompletionStatus::Expired)) => {
                    info!("[Authorizer] Backend attempt expired");
                    return self.finish(SessionEvent::BackendExpired);
                }
            }
        }
    }

    /// Mint the bearer token, then bind it to the session. The token is
    /// revoked again if the session can no longer accept it.
    fn authorize(&self, credential: BackendCredential) -> WorkerExit {
        let Some(session) = self.sessions.get(&self.code) else {
            return WorkerExit::SessionGone;
        };
        let issued = self.tokens.issue(
            credential,
            &session.request.client_id,
            session.request.scope.clone(),
        );

        match self
            .sessions
            .mark_authorized(&self.code, issued.token.clone())
        {
            Ok(()) => {
                info!(
                    "[Authorizer] Session authorized, token {}",
                    issued.token.redacted()
                );
                WorkerExit::Authorized
            }
            Err(e) => {
                self.tokens.revoke(issued.token.as_str());
                debug!("[Authorizer] Late authorization discarded: {}", e);
                Self::exit_for(e)
            }
        }
    }

    fn finish(&self, event: SessionEvent) -> WorkerExit {
        match self.sessions.mark_terminal(&self.code, event) {
            Ok(status) => {
                info!("[Authorizer] Session {} ({:?})", status, event);
                status.into()
            }
            Err(e) => {
                debug!("[Authorizer] Session already settled: {}", e);
                Self::exit_for(e)
            }
        }
    }

    fn exit_for(error: SessionError) -> WorkerExit {
        match error {
            SessionError::NotFound => WorkerExit::SessionGone,
            SessionError::Transition(t) => t.from.into(),
        }
    }
}
