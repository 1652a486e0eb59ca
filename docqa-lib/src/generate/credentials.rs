use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Secret;
use crate::generate::transport_error;
use crate::{Error, Result};

/// OAuth grant type for exchanging an IBM Cloud API key.
pub const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// IAM tokens live for an hour unless the service says otherwise.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Tokens this close to expiry are refreshed rather than used.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct BearerToken {
    value: String,
    expires_at: Instant,
}

impl BearerToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Bearer token cache for the IAM API-key exchange.
///
/// A token is fetched on first use and reused until it is about to expire
/// or [`IamCredentials::invalidate`] is called after the service rejected
/// it. Concurrent callers share a single refresh.
pub struct IamCredentials {
    http: Client,
    token_url: String,
    api_key: Secret,
    cached: Mutex<Option<BearerToken>>,
}

impl IamCredentials {
    pub fn new(http: Client, token_url: impl Into<String>, api_key: Secret) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            api_key,
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, exchanging the API key if needed.
    pub async fn bearer_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.exchange().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Forget the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn exchange(&self) -> Result<BearerToken> {
        tracing::debug!(url = %self.token_url, "requesting IAM token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("apikey", self.api_key.expose()),
                ("grant_type", IAM_GRANT_TYPE),
            ])
            .send()
            .await
            .map_err(|e| credential_error(e, "token exchange"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "IAM token exchange rejected");
            return Err(Error::Credential {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| Error::Credential {
            status: Some(status.as_u16()),
            message: format!("unreadable token response: {e}"),
        })?;

        let lifetime = parsed
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        Ok(BearerToken {
            value: parsed.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

/// Timeouts stay retryable; any other failure to reach IAM is a credential failure.
fn credential_error(e: reqwest::Error, what: &str) -> Error {
    match transport_error(e, what) {
        Error::Transport(message) => Error::Credential {
            status: None,
            message,
        },
        other => other,
    }
}
