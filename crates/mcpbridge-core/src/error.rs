//! Domain errors

use thiserror::Error;

use crate::domain::{SessionEvent, SessionStatus};

/// Event rejected by the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session is {from}; cannot apply {event:?}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub event: SessionEvent,
}

/// CSRF validation failure. Always a hard, local rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("unknown CSRF token")]
    NotFound,
    #[error("CSRF token already used")]
    AlreadyUsed,
    #[error("CSRF token expired")]
    Expired,
    #[error("CSRF token does not match client state")]
    StateMismatch,
}

/// Session store failure outside of code exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown authorization session")]
    NotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Code exchange failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumeError {
    /// Backend has not finished; the client should retry
    #[error("authorization pending")]
    Pending,
    /// Unknown, expired, already consumed or mismatched code
    #[error("invalid grant: {0}")]
    InvalidGrant(&'static str),
    /// Backend definitively rejected the attempt
    #[error("access denied")]
    AccessDenied,
}

/// Failure talking to the legacy backend. Transient from the session's
/// point of view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Configuration loading/validation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Inconsistent(String),
}
