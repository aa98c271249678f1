//! In-memory stores
//!
//! DashMap-backed implementations of the core store traits. Per-entry
//! shard locks serialize the HTTP handlers and background workers that
//! touch the same code or token; nothing here performs I/O.

mod client;
mod csrf;
mod session;
mod token;

pub use client::InMemoryClientRegistry;
pub use csrf::InMemoryCsrfStore;
pub use session::InMemorySessionStore;
pub use token::InMemoryTokenStore;

/// Convert a configured duration, saturating at a century
pub(crate) fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
