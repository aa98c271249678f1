//! Periodic store maintenance
//!
//! Expires overdue sessions, drops stale terminal ones, revokes tokens
//! whose code was never exchanged, and purges dead CSRF entries and tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mcpbridge_core::{CsrfStore, SessionStore, TokenStore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::to_chrono;

/// Counts from one sweep pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub csrf_removed: usize,
    pub sessions_expired: usize,
    pub sessions_removed: usize,
    pub tokens_orphaned: usize,
    pub tokens_removed: usize,
}

pub struct Sweeper {
    csrf: Arc<dyn CsrfStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<dyn TokenStore>,
    interval: Duration,
    retention: chrono::Duration,
}

impl Sweeper {
    pub fn new(
        csrf: Arc<dyn CsrfStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<dyn TokenStore>,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            csrf,
            sessions,
            tokens,
            interval,
            retention: to_chrono(retention),
        }
    }

    pub fn sweep_once(&self) -> SweepStats {
        let now = Utc::now();
        let csrf_removed = self.csrf.sweep(now);

        let sessions = self.sessions.sweep(now, now - self.retention);
        let tokens_orphaned = sessions
            .orphaned_tokens
            .iter()
            .filter(|token| self.tokens.revoke(token.as_str()))
            .count();
        // Runs after revocation so orphans go in this same pass
        let tokens_removed = self.tokens.sweep(now);

        SweepStats {
            csrf_removed,
            sessions_expired: sessions.expired,
            sessions_removed: sessions.removed,
            tokens_orphaned,
            tokens_removed,
        }
    }

    /// Sweep every `interval` until cancelled
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        ticker.tick().await;

        info!("[Sweeper] Running every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stats = self.sweep_once();
                    if stats != SweepStats::default() {
                        debug!("[Sweeper] {:?}", stats);
                    }
                }
            }
        }
        debug!("[Sweeper] Stopped");
    }
}
