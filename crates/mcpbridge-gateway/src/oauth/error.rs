//! OAuth error responses (RFC 6749 §5.2)

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use mcpbridge_core::{BackendError, ConsumeError, CsrfError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON body of every OAuth error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    pub fn new(error: &str, description: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("unsupported response_type: {0}")]
    UnsupportedResponseType(String),
    #[error("unsupported grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("{0}")]
    InvalidClient(String),
    #[error("CSRF validation failed: {0}")]
    Csrf(#[from] CsrfError),
    #[error("authorization pending")]
    AuthorizationPending,
    #[error("{0}")]
    InvalidGrant(&'static str),
    #[error("the backend denied the authorization")]
    AccessDenied,
    #[error("{0}")]
    InvalidClientMetadata(String),
    #[error("{0}")]
    InvalidRedirectUri(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),
    #[error("too many requests to {0}, try again later")]
    SlowDown(String),
}

impl OAuthError {
    /// OAuth `error` code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) | Self::InvalidRequest(_) | Self::Csrf(_) => {
                "invalid_request"
            }
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidClient(_) => "invalid_client",
            Self::AuthorizationPending => "authorization_pending",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::AccessDenied => "access_denied",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::BackendUnavailable(_) => "temporarily_unavailable",
            Self::SlowDown(_) => "slow_down",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::SlowDown(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn body(&self) -> OAuthErrorResponse {
        let description = match self {
            // Backend details stay in the logs
            Self::BackendUnavailable(_) => {
                "the credential backend is unavailable, try again later".to_string()
            }
            other => other.to_string(),
        };
        OAuthErrorResponse::new(self.code(), description)
    }
}

impl From<ConsumeError> for OAuthError {
    fn from(e: ConsumeError) -> Self {
        match e {
            ConsumeError::Pending => Self::AuthorizationPending,
            ConsumeError::InvalidGrant(reason) => Self::InvalidGrant(reason),
            ConsumeError::AccessDenied => Self::AccessDenied,
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}
