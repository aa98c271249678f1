//! Dynamic Client Registration (RFC 7591)
//!
//! Minimal registration: any client may register, registered redirect URIs
//! are enforced at /authorize.

use chrono::Utc;
use mcpbridge_core::{ClientRegistry, RegisteredClient};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::OAuthError;

const SUPPORTED_GRANT_TYPES: &[&str] = &["authorization_code"];
const SUPPORTED_RESPONSE_TYPES: &[&str] = &["code"];

/// Dynamic Client Registration Request (RFC 7591)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DcrRequest {
    /// Human-readable name of the client
    #[serde(default)]
    pub client_name: Option<String>,
    /// Array of allowed redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Dynamic Client Registration Response (RFC 7591)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcrResponse {
    pub client_id: String,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
    /// Seconds since the epoch
    pub client_id_issued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<RegisteredClient> for DcrResponse {
    fn from(client: RegisteredClient) -> Self {
        Self {
            client_id: client.client_id,
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            grant_types: client.grant_types,
            response_types: client.response_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            client_id_issued_at: client.created_at.timestamp(),
            scope: client.scope,
        }
    }
}

fn validate_redirect_uri(uri: &str) -> Result<(), OAuthError> {
    let parsed = url::Url::parse(uri)
        .map_err(|e| OAuthError::InvalidRedirectUri(format!("{uri}: {e}")))?;
    if parsed.fragment().is_some() {
        return Err(OAuthError::InvalidRedirectUri(format!(
            "{uri}: fragment not allowed"
        )));
    }
    Ok(())
}

fn supported_or_default(
    requested: Vec<String>,
    supported: &[&str],
    field: &str,
) -> Result<Vec<String>, OAuthError> {
    if requested.is_empty() {
        return Ok(supported.iter().map(|s| s.to_string()).collect());
    }
    if let Some(bad) = requested.iter().find(|v| !supported.contains(&v.as_str())) {
        return Err(OAuthError::InvalidClientMetadata(format!(
            "unsupported {field}: {bad}"
        )));
    }
    Ok(requested)
}

/// Validate and store a registration request
pub fn process_dcr_request(
    registry: &dyn ClientRegistry,
    request: DcrRequest,
) -> Result<DcrResponse, OAuthError> {
    if request.redirect_uris.is_empty() {
        return Err(OAuthError::InvalidRedirectUri(
            "at least one redirect_uri is required".to_string(),
        ));
    }
    for uri in &request.redirect_uris {
        validate_redirect_uri(uri)?;
    }

    let grant_types =
        supported_or_default(request.grant_types, SUPPORTED_GRANT_TYPES, "grant_type")?;
    let response_types = supported_or_default(
        request.response_types,
        SUPPORTED_RESPONSE_TYPES,
        "response_type",
    )?;
    let token_endpoint_auth_method = match request.token_endpoint_auth_method.as_deref() {
        None | Some("none") => "none".to_string(),
        Some(other) => {
            return Err(OAuthError::InvalidClientMetadata(format!(
                "unsupported token_endpoint_auth_method: {other}"
            )))
        }
    };

    let client = RegisteredClient {
        client_id: format!("client_{}", Uuid::new_v4().simple()),
        client_name: request
            .client_name
            .unwrap_or_else(|| "Unnamed client".to_string()),
        redirect_uris: request.redirect_uris,
        grant_types,
        response_types,
        token_endpoint_auth_method,
        scope: request.scope,
        created_at: Utc::now(),
    };
    registry.register(client.clone());

    info!(
        "[DCR] Registered client: {} ({})",
        client.client_name, client.client_id
    );
    Ok(client.into())
}
