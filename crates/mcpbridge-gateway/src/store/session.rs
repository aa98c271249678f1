use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use mcpbridge_core::{
    AuthorizationCode, AuthorizationSession, AuthorizeRequest, BackendHandle, BearerToken,
    ConsumeError, ConsumedGrant, ExchangeRequest, SessionError, SessionEvent, SessionStatus,
    SessionStore, SessionSweep,
};
use parking_lot::Mutex;
use tracing::debug;

use super::to_chrono;
use crate::auth::{generate_secret, CODE_PREFIX};

/// Authorization sessions keyed by code
///
/// `consume` runs under the entry's shard lock, so concurrent exchanges of
/// one code see exactly one winner.
pub struct InMemorySessionStore {
    sessions: DashMap<String, AuthorizationSession>,
    ttl: chrono::Duration,
    /// Tokens bound to codes that were burned before use; handed to the
    /// next sweep for revocation
    orphans: Mutex<Vec<BearerToken>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: to_chrono(ttl),
            orphans: Mutex::new(Vec::new()),
        }
    }

    fn burn(&self, session: AuthorizationSession) {
        if let Some(token) = session.issued_token {
            self.orphans.lock().push(token);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_until(
        &self,
        request: AuthorizeRequest,
        backend_handle: BackendHandle,
        not_after: Option<DateTime<Utc>>,
    ) -> AuthorizationCode {
        let code = AuthorizationCode::new(generate_secret(CODE_PREFIX));
        let mut session =
            AuthorizationSession::new(code.clone(), backend_handle, request, self.ttl, Utc::now());
        if let Some(not_after) = not_after {
            session.expires_at = session.expires_at.min(not_after);
        }
        self.sessions.insert(code.as_str().to_string(), session);
        code
    }

    fn get(&self, code: &AuthorizationCode) -> Option<AuthorizationSession> {
        let now = Utc::now();
        self.sessions.get_mut(code.as_str()).map(|mut session| {
            session.settle(now);
            session.clone()
        })
    }

    fn mark_authorized(
        &self,
        code: &AuthorizationCode,
        token: BearerToken,
    ) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(code.as_str())
            .ok_or(SessionError::NotFound)?;
        session.authorize(token, Utc::now())?;
        Ok(())
    }

    fn mark_terminal(
        &self,
        code: &AuthorizationCode,
        event: SessionEvent,
    ) -> Result<SessionStatus, SessionError> {
        let mut session = self
            .sessions
            .get_mut(code.as_str())
            .ok_or(SessionError::NotFound)?;
        Ok(session.apply(event, Utc::now())?)
    }

    fn consume(
        &self,
        code: &str,
        exchange: &ExchangeRequest,
    ) -> Result<ConsumedGrant, ConsumeError> {
        let Entry::Occupied(mut entry) = self.sessions.entry(code.to_string()) else {
            return Err(ConsumeError::InvalidGrant("unknown or already used code"));
        };
        entry.get_mut().settle(Utc::now());

        // A binding mismatch means the code leaked; it is burned either way
        if let Err(e) = entry.get().check_exchange(exchange) {
            self.burn(entry.remove());
            return Err(e);
        }

        match entry.get().recorded_status() {
            SessionStatus::Pending => Err(ConsumeError::Pending),
            SessionStatus::Authorized => {
                let session = entry.remove();
                let token = session
                    .issued_token
                    .ok_or(ConsumeError::InvalidGrant("session has no issued token"))?;
                Ok(ConsumedGrant {
                    token,
                    client_id: session.request.client_id,
                    scope: session.request.scope,
                })
            }
            SessionStatus::Expired => {
                entry.remove();
                Err(ConsumeError::InvalidGrant("authorization session expired"))
            }
            SessionStatus::Failed => {
                entry.remove();
                Err(ConsumeError::AccessDenied)
            }
        }
    }

    fn sweep(&self, now: DateTime<Utc>, finished_before: DateTime<Utc>) -> SessionSweep {
        let mut sweep = SessionSweep {
            orphaned_tokens: std::mem::take(&mut *self.orphans.lock()),
            ..SessionSweep::default()
        };

        self.sessions.retain(|_, session| {
            let before = session.recorded_status();
            session.settle(now);
            if before != session.recorded_status() {
                sweep.expired += 1;
            }

            let stale = session.recorded_status().is_terminal()
                && session.finished_at.map_or(false, |at| at <= finished_before);
            if stale {
                sweep.removed += 1;
                if let Some(token) = session.issued_token.take() {
                    sweep.orphaned_tokens.push(token);
                }
            }
            !stale
        });

        if sweep.expired > 0 || sweep.removed > 0 {
            debug!(
                "[Sessions] Sweep: {} expired, {} removed, {} orphaned tokens",
                sweep.expired,
                sweep.removed,
                sweep.orphaned_tokens.len()
            );
        }
        sweep
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
