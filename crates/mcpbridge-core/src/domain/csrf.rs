//! CSRF token - proves a POST /authorize came from the rendered form

use chrono::{DateTime, Duration, Utc};

use super::ids::CsrfState;
use super::session::AuthorizeRequest;
use crate::error::CsrfError;

/// One-time token bound to the client's `state`.
///
/// Carries the validated GET parameters so the POST cannot swap the
/// redirect URI or PKCE challenge.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub value: CsrfState,
    pub request: AuthorizeRequest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl CsrfToken {
    pub fn new(
        value: CsrfState,
        request: AuthorizeRequest,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            request,
            created_at: now,
            expires_at: now + ttl,
            used: false,
        }
    }

    /// Client state this token was issued for
    pub fn associated_client_state(&self) -> &str {
        &self.request.client_state
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check order: replay first, then expiry, then binding
    pub fn check(&self, client_state: &str, now: DateTime<Utc>) -> Result<(), CsrfError> {
        if self.used {
            return Err(CsrfError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(CsrfError::Expired);
        }
        if self.associated_client_state() != client_state {
            return Err(CsrfError::StateMismatch);
        }
        Ok(())
    }
}
