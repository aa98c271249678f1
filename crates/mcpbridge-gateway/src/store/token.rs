use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mcpbridge_core::{BackendCredential, BearerToken, IssuedToken, TokenStore};
use tracing::debug;

use super::to_chrono;
use crate::auth::{generate_secret, TOKEN_PREFIX};

/// Bearer token → backend credential mapping
pub struct InMemoryTokenStore {
    tokens: DashMap<String, IssuedToken>,
    ttl: Option<chrono::Duration>,
}

impl InMemoryTokenStore {
    /// `ttl: None` issues tokens that only end with revocation or the
    /// credential's own expiry
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl: ttl.map(to_chrono),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn issue(
        &self,
        credential: BackendCredential,
        client_id: &str,
        scope: Option<String>,
    ) -> IssuedToken {
        let now = Utc::now();
        let issued = IssuedToken {
            token: BearerToken::new(generate_secret(TOKEN_PREFIX)),
            credential,
            client_id: client_id.to_string(),
            scope,
            issued_at: now,
            expires_at: self.ttl.map(|ttl| now + ttl),
            revoked: false,
        };
        self.tokens
            .insert(issued.token.as_str().to_string(), issued.clone());
        issued
    }

    fn validate(&self, token: &str) -> Option<IssuedToken> {
        let now = Utc::now();
        self.tokens
            .get(token)
            .filter(|issued| issued.is_active(now))
            .map(|issued| issued.value().clone())
    }

    fn revoke(&self, token: &str) -> bool {
        match self.tokens.get_mut(token) {
            Some(mut issued) => {
                issued.revoked = true;
                true
            }
            None => false,
        }
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.tokens.retain(|_, issued| {
            let keep = issued.is_active(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!("[Tokens] Swept {} inactive tokens", removed);
        }
        removed
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}
