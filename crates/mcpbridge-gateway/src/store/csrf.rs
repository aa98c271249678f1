use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use mcpbridge_core::{AuthorizeRequest, CsrfError, CsrfState, CsrfStore, CsrfToken};
use tracing::debug;

use super::to_chrono;
use crate::auth::{generate_secret, CSRF_PREFIX};

/// One-time CSRF tokens
///
/// Used tokens stay until they expire so a replay reports `AlreadyUsed`
/// rather than `NotFound`.
pub struct InMemoryCsrfStore {
    tokens: DashMap<String, CsrfToken>,
    ttl: chrono::Duration,
}

impl InMemoryCsrfStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl: to_chrono(ttl),
        }
    }
}

impl CsrfStore for InMemoryCsrfStore {
    fn issue(&self, request: AuthorizeRequest) -> CsrfToken {
        let value = CsrfState::new(generate_secret(CSRF_PREFIX));
        let token = CsrfToken::new(value.clone(), request, self.ttl, Utc::now());
        self.tokens.insert(value.into_inner(), token.clone());
        token
    }

    fn validate(&self, value: &str, client_state: &str) -> Result<AuthorizeRequest, CsrfError> {
        let now = Utc::now();
        let result = {
            let Some(mut entry) = self.tokens.get_mut(value) else {
                return Err(CsrfError::NotFound);
            };
            let result = entry.check(client_state, now);
            // Any presented attempt burns the token, successful or not
            if !matches!(result, Err(CsrfError::Expired)) {
                entry.used = true;
            }
            result.map(|()| entry.request.clone())
        };

        if let Err(CsrfError::Expired) = result {
            self.tokens.remove_if(value, |_, token| token.is_expired(now));
        }
        result
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.tokens.retain(|_, token| {
            let keep = !token.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!("[CSRF] Swept {} expired tokens", removed);
        }
        removed
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}
