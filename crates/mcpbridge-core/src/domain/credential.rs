//! Backend credential - the legacy service's own secret for one user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential returned by the backend once the user finished authorizing.
///
/// Never leaves the process: clients only ever see the bearer token mapped to it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredential {
    /// Backend API secret (token, key, session cookie...)
    pub secret: String,
    /// Backend account the credential belongs to, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Backend-side expiry, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BackendCredential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            subject: None,
            expires_at: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl std::fmt::Debug for BackendCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCredential")
            .field("secret", &"[REDACTED]")
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
