//! Authorization session - lifecycle of one emulated authorization attempt
//!
//! ```text
//! Pending ──BackendAuthorized──▶ Authorized
//!    │ ────BackendDenied──────▶ Failed
//!    └─────BackendExpired / DeadlineElapsed──▶ Expired
//! ```
//!
//! Terminal states absorb nothing: every event applied to them is rejected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AuthorizationCode, BackendHandle, BearerToken};
use super::pkce::PkceChallenge;
use crate::error::{ConsumeError, TransitionError};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Authorized,
    Expired,
    Failed,
}

/// Inputs driving the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Backend returned a credential
    BackendAuthorized,
    /// Backend definitively rejected the attempt
    BackendDenied,
    /// Backend reports the attempt itself expired
    BackendExpired,
    /// Local wall-clock deadline passed
    DeadlineElapsed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }

    /// Transition function. Only `Pending` accepts events.
    pub fn apply(self, event: SessionEvent) -> Result<SessionStatus, TransitionError> {
        match (self, event) {
            (Self::Pending, SessionEvent::BackendAuthorized) => Ok(Self::Authorized),
            (Self::Pending, SessionEvent::BackendDenied) => Ok(Self::Failed),
            (Self::Pending, SessionEvent::BackendExpired | SessionEvent::DeadlineElapsed) => {
                Ok(Self::Expired)
            }
            (from, event) => Err(TransitionError { from, event }),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated /authorize parameters, carried from the GET through the CSRF
/// token into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub client_state: String,
    pub scope: Option<String>,
    pub resource: Option<String>,
    pub pkce: Option<PkceChallenge>,
}

/// Parameters of a /token call that must match the session
#[derive(Debug, Clone, Default)]
pub struct ExchangeRequest {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
}

/// One authorization attempt, keyed by its code
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub code: AuthorizationCode,
    pub backend_handle: BackendHandle,
    pub request: AuthorizeRequest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    status: SessionStatus,
    /// Set exactly when the session becomes Authorized
    pub issued_token: Option<BearerToken>,
    /// When a terminal state was reached
    pub finished_at: Option<DateTime<Utc>>,
}

impl AuthorizationSession {
    pub fn new(
        code: AuthorizationCode,
        backend_handle: BackendHandle,
        request: AuthorizeRequest,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            backend_handle,
            request,
            created_at: now,
            expires_at: now + ttl,
            status: SessionStatus::Pending,
            issued_token: None,
            finished_at: None,
        }
    }

    /// Stored status, without considering the clock
    pub fn recorded_status(&self) -> SessionStatus {
        self.status
    }

    /// Status as observed at `now`: a Pending session past its expiry is Expired
    /// whatever the backend would say.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Pending && now >= self.expires_at {
            SessionStatus::Expired
        } else {
            self.status
        }
    }

    /// Record an elapsed expiry so the stored status matches what is reported
    pub fn settle(&mut self, now: DateTime<Utc>) {
        if self.status_at(now) != self.status {
            self.status = SessionStatus::Expired;
            self.finished_at = Some(self.expires_at);
        }
    }

    /// Apply a terminal event other than authorization
    pub fn apply(
        &mut self,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, TransitionError> {
        if event == SessionEvent::BackendAuthorized {
            return Err(TransitionError {
                from: self.status,
                event,
            });
        }
        self.settle(now);
        let next = self.status.apply(event)?;
        self.status = next;
        self.finished_at = Some(now);
        Ok(next)
    }

    /// Transition to Authorized, binding the minted bearer token
    pub fn authorize(
        &mut self,
        token: BearerToken,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.settle(now);
        self.status = self.status.apply(SessionEvent::BackendAuthorized)?;
        self.issued_token = Some(token);
        self.finished_at = Some(now);
        Ok(())
    }

    /// Check a /token call against what was recorded at /authorize
    pub fn check_exchange(&self, exchange: &ExchangeRequest) -> Result<(), ConsumeError> {
        if let Some(ref client_id) = exchange.client_id {
            if client_id != &self.request.client_id {
                return Err(ConsumeError::InvalidGrant("client_id mismatch"));
            }
        }
        if let Some(ref redirect_uri) = exchange.redirect_uri {
            if redirect_uri != &self.request.redirect_uri {
                return Err(ConsumeError::InvalidGrant("redirect_uri mismatch"));
            }
        }
        if let Some(ref pkce) = self.request.pkce {
            let Some(ref verifier) = exchange.code_verifier else {
                return Err(ConsumeError::InvalidGrant("code_verifier required"));
            };
            if !pkce.verify(verifier) {
                return Err(ConsumeError::InvalidGrant("PKCE verification failed"));
            }
        }
        Ok(())
    }
}
