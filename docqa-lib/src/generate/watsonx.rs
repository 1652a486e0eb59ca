use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::WatsonxConfig;
use crate::generate::{transport_error, Generator, IamCredentials, RetryPolicy};
use crate::{Error, Result};

/// Answer used when the service returns no generation results.
pub const NO_ANSWER: &str = "No answer returned.";

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    parameters: GenerationParameters,
    project_id: &'a str,
}

#[derive(Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    results: Vec<GenerationResult>,
}

#[derive(Deserialize)]
struct GenerationResult {
    generated_text: Option<String>,
}

/// Client for the watsonx.ai `text/generation` endpoint.
pub struct WatsonxClient {
    http: Client,
    config: WatsonxConfig,
    credentials: Arc<IamCredentials>,
    retry: RetryPolicy,
}

impl WatsonxClient {
    /// Create a client; both outbound calls share `config.timeout()`.
    pub fn new(config: WatsonxConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        let credentials = Arc::new(IamCredentials::new(
            http.clone(),
            config.iam_url.clone(),
            config.api_key.clone(),
        ));

        Ok(Self {
            http,
            config,
            credentials,
            retry: RetryPolicy::none(),
        })
    }

    /// Retry timeouts and 5xx answers according to `policy`.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn credentials(&self) -> &Arc<IamCredentials> {
        &self.credentials
    }

    pub fn config(&self) -> &WatsonxConfig {
        &self.config
    }

    fn generation_url(&self) -> String {
        format!(
            "{}/ml/v1/text/generation?version={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }

    /// Generate text, reporting a non-success status as [`Error::Upstream`].
    pub async fn generate_checked(&self, prompt: &str) -> Result<String> {
        self.retry.run(move || self.generate_once(prompt)).await
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let token = self.credentials.bearer_token().await?;
        let mut response = self.post(prompt, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("generation endpoint rejected the bearer token, refreshing");
            self.credentials.invalidate().await;
            let token = self.credentials.bearer_token().await?;
            response = self.post(prompt, &token).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| transport_error(e, "reading generation error"))?;
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "reading generation response"))?;

        Ok(parsed
            .results
            .into_iter()
            .next()
            .and_then(|r| r.generated_text)
            .unwrap_or_else(|| NO_ANSWER.to_string()))
    }

    async fn post(&self, prompt: &str, token: &str) -> Result<Response> {
        let request = GenerationRequest {
            model_id: &self.config.model_id,
            input: prompt,
            parameters: GenerationParameters {
                max_new_tokens: self.config.max_new_tokens,
            },
            project_id: &self.config.project_id,
        };

        self.http
            .post(self.generation_url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "generation request"))
    }
}

#[async_trait]
impl Generator for WatsonxClient {
    /// Non-success answers from the endpoint come back as `Ok("Error: ...")`.
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.generate_checked(prompt).await {
            Err(e @ Error::Upstream { .. }) => {
                tracing::warn!(error = %e, "generation failed, returning error as answer");
                Ok(e.to_string())
            }
            other => other,
        }
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}
