//! Fixed-window rate limiting for the OAuth endpoints
//!
//! Route-wide windows are shared across callers: the adapter usually sits on
//! loopback where every client has the same address. `/token` is polled while
//! authorization is pending, so its windows are counted per authorization
//! code by the token handler instead.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use mcpbridge_core::RateLimitConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::oauth::OAuthError;

/// Keyed windows kept before expired ones are dropped
const MAX_TRACKED_WINDOWS: usize = 4096;

/// Who shares a route's window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetScope {
    /// One window for every caller, enforced by [`rate_limit_middleware`]
    Route,
    /// One window per caller key, enforced by the handler
    PerKey,
}

/// Budget for one route
#[derive(Debug, Clone, Copy)]
pub struct RouteBudget {
    pub max_requests: u32,
    pub window: Duration,
    pub scope: BudgetScope,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened_at: Instant,
    used: u32,
}

/// Limiter shared by every request (cheap to clone)
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<(&'static str, String), Window>>,
    budgets: Arc<Vec<(&'static str, RouteBudget)>>,
}

impl RateLimiter {
    pub fn new(budgets: Vec<(&'static str, RouteBudget)>) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            budgets: Arc::new(budgets),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let budget = |max_requests, scope| RouteBudget {
            max_requests,
            window: config.window,
            scope,
        };
        Self::new(vec![
            ("/authorize", budget(config.authorize, BudgetScope::Route)),
            ("/token", budget(config.token_per_code, BudgetScope::PerKey)),
            ("/register", budget(config.register, BudgetScope::Route)),
            ("/revoke", budget(config.revoke, BudgetScope::Route)),
        ])
    }

    /// Exact route match; discovery and protected routes have no budget
    fn budget_for(&self, path: &str) -> Option<(&'static str, RouteBudget)> {
        self.budgets.iter().find(|(route, _)| *route == path).copied()
    }

    /// Take one request from the route-wide window. `false` once it is spent.
    ///
    /// Routes counted per key always pass here.
    pub fn try_acquire(&self, path: &str) -> bool {
        match self.budget_for(path) {
            Some((route, budget)) if budget.scope == BudgetScope::Route => {
                self.take(route, String::new(), budget)
            }
            _ => true,
        }
    }

    /// Take one request from the window of `key` on a per-key route
    pub fn try_acquire_for(&self, path: &str, key: &str) -> bool {
        match self.budget_for(path) {
            Some((route, budget)) if budget.scope == BudgetScope::PerKey => {
                self.take(route, key.to_string(), budget)
            }
            _ => true,
        }
    }

    fn take(&self, route: &'static str, key: String, budget: RouteBudget) -> bool {
        let now = Instant::now();
        if self.windows.len() >= MAX_TRACKED_WINDOWS {
            self.windows
                .retain(|_, w| now.duration_since(w.opened_at) < budget.window);
        }

        let mut window = self.windows.entry((route, key)).or_insert(Window {
            opened_at: now,
            used: 0,
        });

        if now.duration_since(window.opened_at) >= budget.window {
            *window = Window {
                opened_at: now,
                used: 0,
            };
        }
        if window.used >= budget.max_requests {
            return false;
        }
        window.used += 1;
        true
    }

    #[cfg(test)]
    fn tracked_windows(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !limiter.try_acquire(path) {
        warn!("[Gateway] Rate limit exceeded on {}", path);
        return OAuthError::SlowDown(path.to_string()).into_response();
    }
    next.run(request).await
}
