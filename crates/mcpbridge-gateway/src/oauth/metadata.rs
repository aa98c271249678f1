//! Discovery documents

use serde::{Deserialize, Serialize};

/// OAuth Authorization Server Metadata (RFC 8414)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub resource_indicators_supported: bool,
}

/// OAuth Protected Resource Metadata (RFC 9728)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    pub bearer_methods_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    pub fn for_base(base: &str, scope: &str) -> Self {
        Self {
            issuer: base.to_string(),
            authorization_endpoint: format!("{}/authorize", base),
            token_endpoint: format!("{}/token", base),
            registration_endpoint: format!("{}/register", base),
            revocation_endpoint: format!("{}/revoke", base),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec!["authorization_code".to_string()],
            code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
            token_endpoint_auth_methods_supported: vec!["none".to_string()],
            scopes_supported: vec![scope.to_string()],
            resource_indicators_supported: true,
        }
    }
}

impl ProtectedResourceMetadata {
    pub fn for_base(base: &str, scope: &str) -> Self {
        Self {
            resource: format!("{}/mcp", base),
            authorization_servers: vec![base.to_string()],
            scopes_supported: Some(vec![scope.to_string()]),
            bearer_methods_supported: vec!["header".to_string()],
        }
    }
}
