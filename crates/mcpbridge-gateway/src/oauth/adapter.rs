//! OAuth Adapter
//!
//! Translates the OAuth authorization code flow onto the backend's
//! start/poll primitive. HTTP handlers are thin wrappers around the methods
//! here; nothing in this file knows about axum routing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mcpbridge_core::{
    AuthorizeMode, AuthorizeRequest, BackendAuthClient, BridgeConfig, ClientRegistry, CsrfStore,
    ExchangeRequest, IssuedToken, PkceChallenge, PkceMethod, SessionStore, StartAuthRequest,
    TokenStore, UserAgentLauncher,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::dcr::{process_dcr_request, DcrRequest, DcrResponse};
use super::metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
use super::pages;
use super::OAuthError;
use crate::authorizer::BackgroundAuthorizer;
use crate::server::GatewayDependencies;

/// Query parameters of GET /authorize
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub resource: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Backend account hint, used in `Direct` mode
    pub account: Option<String>,
}

/// Body of POST /authorize
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeForm {
    pub client_id: Option<String>,
    pub csrf_state: Option<String>,
    pub client_state: Option<String>,
    pub account: Option<String>,
}

/// Body of POST /token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    pub scope: String,
}

/// Body of POST /revoke (RFC 7009)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
}

/// What GET /authorize answers with
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// HTML form to render
    Form(String),
    /// Client redirect URL carrying `code` and `state`
    Redirect(String),
}

/// Treat empty values like absent ones
fn required(value: Option<String>, name: &'static str) -> Result<String, OAuthError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(OAuthError::MissingParameter(name))
}

pub struct OAuthAdapter {
    base_url: String,
    default_scope: String,
    authorize_mode: AuthorizeMode,
    require_registered_clients: bool,
    csrf: Arc<dyn CsrfStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<dyn TokenStore>,
    clients: Arc<dyn ClientRegistry>,
    backend: Arc<dyn BackendAuthClient>,
    launcher: Arc<dyn UserAgentLauncher>,
    authorizer: Arc<BackgroundAuthorizer>,
}

impl OAuthAdapter {
    pub fn new(
        config: &BridgeConfig,
        deps: &GatewayDependencies,
        authorizer: Arc<BackgroundAuthorizer>,
    ) -> Self {
        Self {
            base_url: config.server.base_url(),
            default_scope: config.token.default_scope.clone(),
            authorize_mode: config.authorize_mode,
            require_registered_clients: config.require_registered_clients,
            csrf: deps.csrf_store.clone(),
            sessions: deps.session_store.clone(),
            tokens: deps.token_store.clone(),
            clients: deps.client_registry.clone(),
            backend: deps.backend.clone(),
            launcher: deps.launcher.clone(),
            authorizer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.base_url)
    }

    pub fn authorization_server_metadata(&self) -> AuthorizationServerMetadata {
        AuthorizationServerMetadata::for_base(&self.base_url, &self.default_scope)
    }

    pub fn protected_resource_metadata(&self) -> ProtectedResourceMetadata {
        ProtectedResourceMetadata::for_base(&self.base_url, &self.default_scope)
    }

    /// GET /authorize
    pub async fn authorize(&self, params: AuthorizeParams) -> Result<AuthorizeOutcome, OAuthError> {
        let account = params.account.clone();
        let request = self.parse_authorize(params)?;

        match self.authorize_mode {
            AuthorizeMode::Form => {
                let csrf = self.csrf.issue(request);
                debug!(
                    "[OAuth] Issued CSRF token {} for client {}",
                    csrf.value.redacted(),
                    csrf.request.client_id
                );
                Ok(AuthorizeOutcome::Form(pages::authorize_form(
                    &csrf,
                    "/authorize",
                )))
            }
            AuthorizeMode::Direct => self
                .start_session(request, account)
                .await
                .map(AuthorizeOutcome::Redirect),
        }
    }

    /// POST /authorize. Returns the client redirect URL.
    pub async fn submit_authorize(&self, form: AuthorizeForm) -> Result<String, OAuthError> {
        // All fields are checked before the CSRF token is touched
        let client_id = required(form.client_id, "client_id")?;
        let csrf_state = required(form.csrf_state, "csrf_state")?;
        let client_state = required(form.client_state, "client_state")?;
        let account = required(form.account, "account")?;

        let request = self.csrf.validate(&csrf_state, &client_state).map_err(|e| {
            warn!("[OAuth] CSRF validation failed: {}", e);
            OAuthError::from(e)
        })?;
        if request.client_id != client_id {
            warn!("[OAuth] Form client_id does not match the authorize request");
            return Err(OAuthError::InvalidRequest(
                "client_id does not match the authorization request".to_string(),
            ));
        }

        self.start_session(request, Some(account)).await
    }

    fn parse_authorize(&self, params: AuthorizeParams) -> Result<AuthorizeRequest, OAuthError> {
        let client_id = required(params.client_id, "client_id")?;
        let redirect_uri = required(params.redirect_uri, "redirect_uri")?;
        let state = required(params.state, "state")?;

        if let Some(response_type) = params.response_type {
            if response_type != "code" {
                return Err(OAuthError::UnsupportedResponseType(response_type));
            }
        }
        Url::parse(&redirect_uri).map_err(|_| {
            OAuthError::InvalidRequest("redirect_uri must be an absolute URL".to_string())
        })?;

        match self.clients.get(&client_id) {
            Some(client) if !client.allows_redirect(&redirect_uri) => {
                warn!(
                    "[OAuth] redirect_uri {} not registered for {}",
                    redirect_uri, client_id
                );
                return Err(OAuthError::InvalidRequest(
                    "redirect_uri is not registered for this client".to_string(),
                ));
            }
            None if self.require_registered_clients => {
                return Err(OAuthError::InvalidClient("unknown client_id".to_string()));
            }
            _ => {}
        }

        let pkce = match (params.code_challenge, params.code_challenge_method) {
            (Some(challenge), method) => {
                let method = PkceMethod::parse(method.as_deref()).ok_or_else(|| {
                    OAuthError::InvalidRequest("unsupported code_challenge_method".to_string())
                })?;
                Some(PkceChallenge::new(challenge, method))
            }
            (None, Some(_)) => {
                return Err(OAuthError::InvalidRequest(
                    "code_challenge_method without code_challenge".to_string(),
                ))
            }
            (None, None) => None,
        };

        Ok(AuthorizeRequest {
            client_id,
            redirect_uri,
            client_state: state,
            scope: params.scope,
            resource: params.resource,
            pkce,
        })
    }

    /// Start the backend attempt, create the session, start polling and
    /// send the user to the backend page.
    async fn start_session(
        &self,
        request: AuthorizeRequest,
        account: Option<String>,
    ) -> Result<String, OAuthError> {
        let mut redirect = Url::parse(&request.redirect_uri).map_err(|_| {
            OAuthError::InvalidRequest("redirect_uri must be an absolute URL".to_string())
        })?;

        let attempt = self
            .backend
            .start_auth(&StartAuthRequest {
                account,
                client_id: request.client_id.clone(),
            })
            .await
            .map_err(|e| {
                warn!("[OAuth] Backend start_auth failed: {}", e);
                OAuthError::from(e)
            })?;

        let client_id = request.client_id.clone();
        let client_state = request.client_state.clone();
        let code = self
            .sessions
            .create_until(request, attempt.handle.clone(), attempt.expires_at);
        redirect
            .query_pairs_mut()
            .append_pair("code", code.as_str())
            .append_pair("state", &client_state);

        info!(
            "[OAuth] Session {} started for client {} (backend handle {})",
            code.redacted(),
            client_id,
            attempt.handle.redacted()
        );
        match attempt.expires_at {
            Some(expires_at) => {
                let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                self.authorizer.spawn_within(code, attempt.handle, remaining);
            }
            None => self.authorizer.spawn(code, attempt.handle),
        }

        if let Err(e) = self.launcher.launch(&attempt.auth_url) {
            warn!("[OAuth] Could not hand backend URL to the user agent: {}", e);
        }

        Ok(redirect.into())
    }

    /// POST /token
    pub fn exchange(&self, request: TokenRequest) -> Result<TokenResponse, OAuthError> {
        let grant_type = required(request.grant_type, "grant_type")?;
        if grant_type != "authorization_code" {
            return Err(OAuthError::UnsupportedGrantType(grant_type));
        }
        let code = required(request.code, "code")?;

        let exchange = ExchangeRequest {
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            code_verifier: request.code_verifier,
        };
        let grant = self.sessions.consume(&code, &exchange).map_err(|e| {
            debug!("[OAuth] Code exchange refused: {}", e);
            OAuthError::from(e)
        })?;

        let issued = self
            .tokens
            .validate(grant.token.as_str())
            .ok_or(OAuthError::InvalidGrant("issued token is no longer active"))?;

        info!(
            "[OAuth] Issued token {} to client {}",
            issued.token.redacted(),
            grant.client_id
        );
        Ok(TokenResponse {
            expires_in: issued.expires_in(Utc::now()),
            access_token: issued.token.into_inner(),
            token_type: "Bearer".to_string(),
            scope: grant.scope.unwrap_or_else(|| self.default_scope.clone()),
        })
    }

    /// POST /register
    pub fn register(&self, request: DcrRequest) -> Result<DcrResponse, OAuthError> {
        process_dcr_request(self.clients.as_ref(), request)
    }

    /// POST /revoke. Unknown tokens are not an error.
    pub fn revoke(&self, request: RevokeRequest) -> Result<(), OAuthError> {
        let token = required(request.token, "token")?;
        let hint = request.token_type_hint.as_deref().unwrap_or("-");
        if self.tokens.revoke(&token) {
            info!("[OAuth] Token revoked (hint: {})", hint);
        } else {
            debug!("[OAuth] Revocation of unknown token ignored (hint: {})", hint);
        }
        Ok(())
    }

    /// Token store lookup for the bearer middleware
    pub fn validate_bearer(&self, token: &str) -> Option<IssuedToken> {
        self.tokens.validate(token)
    }
}
