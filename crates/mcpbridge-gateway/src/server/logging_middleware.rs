//! HTTP Request/Response Logging Middleware
//!
//! One entry and one exit line per request, tagged with a trace id.
//! Bodies are logged at DEBUG, redacted on endpoints that carry secrets.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, warn, Instrument};

use mcpbridge_core::char_prefix;

use crate::logging::TraceContext;

/// Bodies above this size are summarized, not buffered for logging
const MAX_BODY_LOG_SIZE: usize = 64 * 1024;

/// Largest request body buffered for logging; bigger ones get 413
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Paths whose bodies carry codes, verifiers, tokens or client secrets
const SENSITIVE_PATHS: &[&str] = &["/token", "/register", "/revoke"];

/// Headers that are never printed
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Whether bodies on this request must be redacted
pub fn is_sensitive(method: &Method, path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.starts_with(p))
        || (*method == Method::POST && path.starts_with("/authorize"))
}

/// Compact header dump for DEBUG
fn redact_headers_compact(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| {
            matches!(
                name.as_str(),
                "content-type" | "accept" | "user-agent" | "authorization" | "origin"
            )
        })
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Body as a short loggable string
pub fn format_body(bytes: &[u8], redact: bool) -> String {
    if redact {
        return "[REDACTED]".to_string();
    }
    if bytes.is_empty() {
        return "[empty]".to_string();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
                return serde_json::to_string(&json).unwrap_or_else(|_| text.to_string());
            }
            let head = char_prefix(text, 200);
            if head.len() < text.len() {
                format!("{}...", head)
            } else {
                text.to_string()
            }
        }
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

/// Logging middleware for requests and responses
pub async fn http_logging_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let redact = is_sensitive(&method, &path);

    let ctx = TraceContext::new(method.as_str(), &path);
    request.extensions_mut().insert(ctx.clone());
    let span = ctx.span();

    async move {
        ctx.log_received();
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(request.headers()),
            "Request headers"
        );

        let (parts, body) = request.into_parts();
        let body_bytes = match Limited::new(body, MAX_REQUEST_BODY_SIZE).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(
                    trace_id = %ctx.trace_id,
                    "Request body over {} bytes", MAX_REQUEST_BODY_SIZE
                );
                return Err(StatusCode::PAYLOAD_TOO_LARGE);
            }
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                return Err(StatusCode::BAD_REQUEST);
            }
        };
        if !body_bytes.is_empty() && body_bytes.len() <= MAX_BODY_LOG_SIZE {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, redact),
                "Request body"
            );
        }
        let request = Request::from_parts(parts, Body::from(body_bytes));

        let response = next.run(request).await;
        let (parts, body) = response.into_parts();
        let status = parts.status;

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };
        // HTML pages are skipped
        if !body_bytes.is_empty() && body_bytes.len() < 1000 && !is_html(&parts.headers) {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, redact),
                "Response body"
            );
        }

        ctx.log_completed(status.as_u16());
        Ok(Response::from_parts(parts, Body::from(body_bytes)))
    }
    .instrument(span)
    .await
}
