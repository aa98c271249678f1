//! JSON-over-HTTP backend client
//!
//! - `POST {base}{start_path}` with `{"account", "client_id"}` answers
//!   `{"handle", "auth_url", "expires_in"?}`
//! - `GET {base}{status_path}?handle=...` answers
//!   `{"status": "pending" | "authorized" | "denied" | "expired", ...}`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpbridge_core::{
    BackendAttempt, BackendAuthClient, BackendConfig, BackendCredential, BackendError,
    BackendHandle, CompletionStatus, StartAuthRequest,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Longest backend error body kept in `BackendError::Api`
const MAX_ERROR_BODY: usize = 256;

#[derive(Serialize)]
struct StartBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<&'a str>,
    client_id: &'a str,
}

#[derive(Deserialize)]
struct StartResponse {
    handle: String,
    auth_url: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    credential: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    reason: Option<String>,
}

pub struct HttpBackendClient {
    client: reqwest::Client,
    start_url: Url,
    status_url: Url,
}

impl HttpBackendClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let base = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            start_url: base.join(&config.start_path)?,
            status_url: base.join(&config.status_path)?,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| message.is_char_boundary(i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// `now + expires_in`, rejecting lifetimes chrono cannot represent
fn expiry_after(secs: i64) -> Result<DateTime<Utc>, BackendError> {
    chrono::Duration::try_seconds(secs)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| BackendError::InvalidResponse(format!("expires_in out of range: {secs}")))
}

fn parse_status(body: StatusResponse) -> Result<CompletionStatus, BackendError> {
    match body.status.as_str() {
        "pending" => Ok(CompletionStatus::Pending),
        "authorized" => {
            let secret = body.credential.ok_or_else(|| {
                BackendError::InvalidResponse("authorized without credential".to_string())
            })?;
            let mut credential = BackendCredential::new(secret);
            if let Some(subject) = body.subject {
                credential = credential.with_subject(subject);
            }
            if let Some(secs) = body.expires_in {
                credential = credential.with_expiry(expiry_after(secs)?);
            }
            Ok(CompletionStatus::Authorized(credential))
        }
        "denied" => Ok(CompletionStatus::Denied {
            reason: body.reason,
        }),
        "expired" => Ok(CompletionStatus::Expired),
        other => Err(BackendError::InvalidResponse(format!(
            "unknown status {:?}",
            other
        ))),
    }
}

#[async_trait]
impl BackendAuthClient for HttpBackendClient {
    async fn start_auth(&self, request: &StartAuthRequest) -> Result<BackendAttempt, BackendError> {
        debug!("[Backend] POST {}", self.start_url);
        let response = self
            .client
            .post(self.start_url.clone())
            .json(&StartBody {
                account: request.account.as_deref(),
                client_id: &request.client_id,
            })
            .send()
            .await
            .map_err(transport)?;

        let body: StartResponse = Self::decode(response).await?;
        Ok(BackendAttempt {
            handle: BackendHandle::new(body.handle),
            auth_url: body.auth_url,
            expires_at: body.expires_in.map(expiry_after).transpose()?,
        })
    }

    async fn check_completion(
        &self,
        handle: &BackendHandle,
    ) -> Result<CompletionStatus, BackendError> {
        let response = self
            .client
            .get(self.status_url.clone())
            .query(&[("handle", handle.as_str())])
            .send()
            .await
            .map_err(transport)?;

        parse_status(Self::decode(response).await?)
    }
}
