//! Store traits
//!
//! These traits define the state the adapter keeps without fixing the
//! container. Implementations must serialize concurrent access: an HTTP
//! handler and a background worker may touch the same entry at once.
//! All operations are synchronous in-memory lookups; none may call out to
//! the backend.

use chrono::{DateTime, Utc};

use crate::domain::{
    AuthorizationCode, AuthorizationSession, AuthorizeRequest, BackendCredential, BackendHandle,
    BearerToken, CsrfToken, ExchangeRequest, IssuedToken, RegisteredClient, SessionEvent,
    SessionStatus,
};
use crate::error::{ConsumeError, CsrfError, SessionError};

/// One-time CSRF tokens for the authorize form
pub trait CsrfStore: Send + Sync {
    /// Issue an unguessable token bound to `request.client_state`
    fn issue(&self, request: AuthorizeRequest) -> CsrfToken;

    /// Validate and burn a token. Returns the request it was issued for.
    fn validate(&self, value: &str, client_state: &str) -> Result<AuthorizeRequest, CsrfError>;

    /// Drop expired entries, returning how many were removed
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Granted code, as handed to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedGrant {
    pub token: BearerToken,
    pub client_id: String,
    pub scope: Option<String>,
}

/// Result of a session sweep
#[derive(Debug, Default)]
pub struct SessionSweep {
    /// Pending sessions moved to Expired
    pub expired: usize,
    /// Terminal sessions removed
    pub removed: usize,
    /// Tokens minted for sessions whose code was never exchanged
    pub orphaned_tokens: Vec<BearerToken>,
}

/// Authorization sessions keyed by code
pub trait SessionStore: Send + Sync {
    /// Create a Pending session and return its fresh code
    fn create(&self, request: AuthorizeRequest, backend_handle: BackendHandle) -> AuthorizationCode {
        self.create_until(request, backend_handle, None)
    }

    /// Like `create`, but the session expires no later than `not_after`
    /// (the backend attempt's own deadline)
    fn create_until(
        &self,
        request: AuthorizeRequest,
        backend_handle: BackendHandle,
        not_after: Option<DateTime<Utc>>,
    ) -> AuthorizationCode;

    /// Snapshot of a session, with elapsed expiry already applied
    fn get(&self, code: &AuthorizationCode) -> Option<AuthorizationSession>;

    /// Current status, with the same expiry rule as `get`
    fn status(&self, code: &AuthorizationCode) -> Option<SessionStatus> {
        self.get(code).map(|s| s.recorded_status())
    }

    /// Pending → Authorized, binding the minted token
    fn mark_authorized(
        &self,
        code: &AuthorizationCode,
        token: BearerToken,
    ) -> Result<(), SessionError>;

    /// Pending → Failed/Expired
    fn mark_terminal(
        &self,
        code: &AuthorizationCode,
        event: SessionEvent,
    ) -> Result<SessionStatus, SessionError>;

    /// Atomic check-and-invalidate. Exactly one caller can succeed per code.
    fn consume(
        &self,
        code: &str,
        exchange: &ExchangeRequest,
    ) -> Result<ConsumedGrant, ConsumeError>;

    /// Settle expiries and drop terminal sessions that finished at or
    /// before `finished_before`
    fn sweep(&self, now: DateTime<Utc>, finished_before: DateTime<Utc>) -> SessionSweep;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bearer tokens → backend credentials
pub trait TokenStore: Send + Sync {
    /// Mint a bearer token for a freshly authorized credential
    fn issue(
        &self,
        credential: BackendCredential,
        client_id: &str,
        scope: Option<String>,
    ) -> IssuedToken;

    /// O(1) lookup of an active token
    fn validate(&self, token: &str) -> Option<IssuedToken>;

    /// Mark revoked. Returns whether the token was known.
    fn revoke(&self, token: &str) -> bool;

    /// Drop expired and revoked tokens
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dynamic Client Registration storage
pub trait ClientRegistry: Send + Sync {
    fn register(&self, client: RegisteredClient);

    fn get(&self, client_id: &str) -> Option<RegisteredClient>;
}
