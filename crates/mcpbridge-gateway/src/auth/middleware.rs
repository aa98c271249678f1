//! Bearer middleware for protected routes
//!
//! Validates the token against the token store and injects
//! [`AuthenticatedClient`] into request extensions. Every rejection is a 401
//! carrying a `WWW-Authenticate` challenge that points at the protected
//! resource metadata.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use mcpbridge_core::char_prefix;
use tracing::{debug, warn};

use super::{extract_bearer, AuthenticatedClient, BearerRejection};
use crate::logging::TraceContext;
use crate::oauth::{OAuthAdapter, OAuthErrorResponse};

/// `WWW-Authenticate` value for a rejected request
pub fn challenge_header(resource_metadata: Option<&str>, rejection: BearerRejection) -> String {
    let mut value = String::from("Bearer realm=\"mcpbridge\"");
    if let Some(url) = resource_metadata {
        value.push_str(&format!(", resource_metadata=\"{}\"", url));
    }
    if let Some(code) = rejection.error_code() {
        value.push_str(&format!(
            ", error=\"{}\", error_description=\"{}\"",
            code,
            rejection.description()
        ));
    }
    value
}

/// 401 with challenge header and an OAuth error body
pub fn unauthorized_response(resource_metadata: Option<&str>, rejection: BearerRejection) -> Response {
    let challenge = challenge_header(resource_metadata, rejection);
    let body = OAuthErrorResponse::new(
        rejection.error_code().unwrap_or("invalid_request"),
        rejection.description(),
    );
    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    match HeaderValue::from_str(&challenge) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        Err(e) => warn!("[Auth] Unencodable challenge header: {}", e),
    }
    response
}

/// Bearer token middleware
///
/// Extracts Bearer token → looks it up → injects AuthenticatedClient
pub async fn bearer_auth_middleware(
    State(adapter): State<Arc<OAuthAdapter>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Skip auth for OPTIONS (CORS preflight)
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone())
        .unwrap_or_else(|| "??????".to_string());
    let metadata_url = adapter.resource_metadata_url();

    let token = match extract_bearer(request.headers()) {
        Ok(token) => token,
        Err(rejection) => {
            warn!(trace_id = %trace_id, "[Auth] {}", rejection.description());
            return unauthorized_response(Some(&metadata_url), rejection);
        }
    };

    let Some(issued) = adapter.validate_bearer(token) else {
        warn!(trace_id = %trace_id, "[Auth] Token verification failed");
        return unauthorized_response(Some(&metadata_url), BearerRejection::Invalid);
    };

    debug!(
        trace_id = %trace_id,
        client = %char_prefix(&issued.client_id, 12),
        "[Auth] Bearer accepted"
    );
    request
        .extensions_mut()
        .insert(AuthenticatedClient::from(issued));

    next.run(request).await
}
