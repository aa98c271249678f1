//! Secrets and bearer authentication
//!
//! Every secret the adapter hands out (authorization codes, CSRF values,
//! bearer tokens) comes from [`generate_secret`]. Bearer validation is a
//! token store lookup; the legacy backend is never consulted per request.

mod middleware;

pub use middleware::{bearer_auth_middleware, challenge_header, unauthorized_response};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use mcpbridge_core::{BackendCredential, BearerToken, IssuedToken};
use rand::Rng;
use tracing::error;

use crate::oauth::OAuthErrorResponse;

/// Authorization code prefix
pub const CODE_PREFIX: &str = "mbc_";
/// CSRF value prefix
pub const CSRF_PREFIX: &str = "csrf_";
/// Bearer token prefix
pub const TOKEN_PREFIX: &str = "tok_";

/// Generate a URL-safe secret with 256 bits of entropy
pub fn generate_secret(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    format!("{}{}", prefix, URL_SAFE_NO_PAD.encode(random_bytes))
}

/// Why a request carried no usable bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerRejection {
    /// No Authorization header at all
    Missing,
    /// Header present but not `Bearer <token>`
    Malformed,
    /// Unknown, expired or revoked token
    Invalid,
}

impl BearerRejection {
    /// RFC 6750 `error` attribute for the challenge, if any
    pub fn error_code(self) -> Option<&'static str> {
        match self {
            Self::Missing => None,
            Self::Malformed => Some("invalid_request"),
            Self::Invalid => Some("invalid_token"),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Missing => "Missing Authorization header",
            Self::Malformed => "Authorization header must use Bearer scheme",
            Self::Invalid => "Invalid or expired token",
        }
    }
}

/// Extract the raw token from `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively (RFC 7235).
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, BearerRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(BearerRejection::Missing)?
        .to_str()
        .map_err(|_| BearerRejection::Malformed)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(BearerRejection::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(BearerRejection::Malformed);
    }
    Ok(token)
}

/// Caller identity attached to requests that passed bearer validation
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    pub token: BearerToken,
    pub client_id: String,
    pub scope: Option<String>,
    pub credential: BackendCredential,
}

impl From<IssuedToken> for AuthenticatedClient {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            client_id: issued.client_id,
            scope: issued.scope,
            credential: issued.credential,
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedClient
where
    S: Send + Sync,
{
    type Rejection = Response;

    /// Only succeeds behind [`bearer_auth_middleware`]. A route mounted
    /// without it is a wiring bug, answered with 500 rather than a challenge.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedClient>()
            .cloned()
            .ok_or_else(|| {
                error!(
                    "[Auth] {} reached an authenticated handler without bearer middleware",
                    parts.uri.path()
                );
                let body =
                    OAuthErrorResponse::new("server_error", "authentication is not configured");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            })
    }
}
