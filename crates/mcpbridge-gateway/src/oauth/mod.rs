//! OAuth 2.0 authorization server surface
//!
//! - Discovery metadata (RFC 8414, RFC 9728)
//! - Authorization code flow on top of a poll-based backend
//! - PKCE (RFC 7636)
//! - Dynamic Client Registration (RFC 7591)
//! - Token revocation (RFC 7009)

mod adapter;
mod dcr;
mod error;
mod metadata;
pub mod pages;

pub use adapter::{
    AuthorizeForm, AuthorizeOutcome, AuthorizeParams, OAuthAdapter, RevokeRequest, TokenRequest,
    TokenResponse,
};
pub use dcr::{process_dcr_request, DcrRequest, DcrResponse};
pub use error::{OAuthError, OAuthErrorResponse};
pub use metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
