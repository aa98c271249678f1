//! HTTP handlers for the gateway server
//!
//! Each handler extracts its input, calls the matching [`OAuthAdapter`]
//! method and shapes the response. Malformed bodies or queries become OAuth
//! `invalid_request` errors rather than axum's plain-text rejections.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    Extension, Form,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::rate_limit::RateLimiter;
use crate::oauth::{
    AuthorizationServerMetadata, AuthorizeForm, AuthorizeOutcome, AuthorizeParams, DcrRequest,
    OAuthAdapter, OAuthError, ProtectedResourceMetadata, RevokeRequest, TokenRequest,
};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    debug!("[Gateway] Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OAuth metadata endpoint (RFC 8414)
pub async fn oauth_metadata(
    State(adapter): State<Arc<OAuthAdapter>>,
) -> Json<AuthorizationServerMetadata> {
    info!("[Gateway] OAuth metadata request - serving authorization server metadata");
    Json(adapter.authorization_server_metadata())
}

/// Protected resource metadata endpoint (RFC 9728)
pub async fn resource_metadata(
    State(adapter): State<Arc<OAuthAdapter>>,
) -> Json<ProtectedResourceMetadata> {
    info!("[Gateway] Protected resource metadata request");
    Json(adapter.protected_resource_metadata())
}

/// 302 to `location`, never cached
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, value),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            ],
        )
            .into_response(),
        Err(_) => {
            OAuthError::InvalidRequest("redirect_uri cannot be used as a Location".to_string())
                .into_response()
        }
    }
}

/// GET /authorize
pub async fn oauth_authorize(
    State(adapter): State<Arc<OAuthAdapter>>,
    params: Result<Query<AuthorizeParams>, QueryRejection>,
) -> Result<Response, OAuthError> {
    let Query(params) =
        params.map_err(|e| OAuthError::InvalidRequest(format!("malformed query: {}", e)))?;
    info!(
        "[OAuth] Authorize request: client_id={:?}, redirect_uri={:?}",
        params.client_id, params.redirect_uri
    );

    match adapter.authorize(params).await {
        Ok(AuthorizeOutcome::Form(page)) => Ok((
            [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
            Html(page),
        )
            .into_response()),
        Ok(AuthorizeOutcome::Redirect(location)) => Ok(found(&location)),
        Err(e) => {
            warn!("[OAuth] Authorize request rejected: {}", e);
            Err(e)
        }
    }
}

/// POST /authorize
///
/// Fields come from the urlencoded body only; query parameters on the POST
/// are ignored.
pub async fn oauth_authorize_submit(
    State(adapter): State<Arc<OAuthAdapter>>,
    form: Result<Form<AuthorizeForm>, FormRejection>,
) -> Result<Response, OAuthError> {
    let Form(form) =
        form.map_err(|e| OAuthError::InvalidRequest(format!("malformed form body: {}", e)))?;

    match adapter.submit_authorize(form).await {
        Ok(location) => Ok(found(&location)),
        Err(e) => {
            warn!("[OAuth] Authorize submission rejected: {}", e);
            Err(e)
        }
    }
}

/// POST /token
pub async fn oauth_token(
    State(adapter): State<Arc<OAuthAdapter>>,
    Extension(limiter): Extension<RateLimiter>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Response, OAuthError> {
    let Form(request) =
        form.map_err(|e| OAuthError::InvalidRequest(format!("malformed form body: {}", e)))?;
    info!(
        "[OAuth] Token request: grant_type={:?}, client_id={:?}",
        request.grant_type, request.client_id
    );

    // Pending clients poll with their own code
    let code = request.code.as_deref().unwrap_or_default();
    if !limiter.try_acquire_for("/token", code) {
        warn!("[OAuth] Token polling budget spent for client {:?}", request.client_id);
        return Err(OAuthError::SlowDown("/token".to_string()));
    }

    let response = adapter.exchange(request)?;
    Ok((
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(response),
    )
        .into_response())
}

/// POST /register (RFC 7591)
pub async fn oauth_register(
    State(adapter): State<Arc<OAuthAdapter>>,
    body: Result<Json<DcrRequest>, JsonRejection>,
) -> Result<Response, OAuthError> {
    let Json(request) =
        body.map_err(|e| OAuthError::InvalidClientMetadata(format!("malformed body: {}", e)))?;
    info!(
        "[DCR] Registration request from: {:?} (redirect_uris: {:?})",
        request.client_name, request.redirect_uris
    );

    match adapter.register(request) {
        Ok(response) => {
            info!("[DCR] Registered client {}", response.client_id);
            Ok((StatusCode::CREATED, Json(response)).into_response())
        }
        Err(e) => {
            warn!("[DCR] Registration failed: {}", e);
            Err(e)
        }
    }
}

/// POST /revoke (RFC 7009)
pub async fn oauth_revoke(
    State(adapter): State<Arc<OAuthAdapter>>,
    form: Result<Form<RevokeRequest>, FormRejection>,
) -> Result<StatusCode, OAuthError> {
    let Form(request) =
        form.map_err(|e| OAuthError::InvalidRequest(format!("malformed form body: {}", e)))?;
    adapter.revoke(request)?;
    Ok(StatusCode::OK)
}
