//! Issued bearer token - the only record the auth middleware consults

use chrono::{DateTime, Utc};

use super::credential::BackendCredential;
use super::ids::BearerToken;

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: BearerToken,
    pub credential: BackendCredential,
    pub client_id: String,
    pub scope: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl IssuedToken {
    /// Usable at `now`: not revoked, not past its own expiry nor the credential's
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked
            && self.expires_at.map_or(true, |at| now < at)
            && !self.credential.is_expired(now)
    }

    /// Seconds left, for the `expires_in` token response field
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds().max(0))
    }
}
