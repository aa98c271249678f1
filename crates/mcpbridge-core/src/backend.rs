//! Legacy backend contract
//!
//! The backend is opaque and never assumed to redirect: it can start an
//! attempt and answer whether that attempt completed. Nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{BackendCredential, BackendHandle};
use crate::error::BackendError;

/// Input of `start_auth`
#[derive(Debug, Clone, Default)]
pub struct StartAuthRequest {
    /// Backend account identifier typed into the authorize form
    pub account: Option<String>,
    /// OAuth client the attempt is for (informational)
    pub client_id: String,
}

/// A started backend attempt
#[derive(Debug, Clone)]
pub struct BackendAttempt {
    pub handle: BackendHandle,
    /// Page the user must visit to authorize
    pub auth_url: String,
    /// Backend's own deadline for the attempt, if reported
    pub expires_at: Option<DateTime<Utc>>,
}

/// Answer of `check_completion`
#[derive(Debug, Clone)]
pub enum CompletionStatus {
    Pending,
    Authorized(BackendCredential),
    Denied { reason: Option<String> },
    Expired,
}

#[async_trait]
pub trait BackendAuthClient: Send + Sync {
    async fn start_auth(&self, request: &StartAuthRequest) -> Result<BackendAttempt, BackendError>;

    async fn check_completion(
        &self,
        handle: &BackendHandle,
    ) -> Result<CompletionStatus, BackendError>;
}

/// Sends the user to the backend's authorization page out-of-band
pub trait UserAgentLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<(), String>;
}
