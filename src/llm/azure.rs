//! HTTP plumbing shared by the Azure OpenAI chat and embedding clients.

use crate::config::AzureConfig;
use crate::error::{RagError, Result, Service, UpstreamKind};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Base delay before the first retry; doubled on every further attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// OpenAI-style API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Authenticated JSON transport for one Azure OpenAI resource.
#[derive(Clone)]
pub(crate) struct AzureTransport {
    client: Client,
    config: AzureConfig,
}

impl AzureTransport {
    pub(crate) fn new(config: AzureConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub(crate) fn config(&self) -> &AzureConfig {
        &self.config
    }

    /// URL of a deployment operation, e.g. `chat/completions` or `embeddings`.
    pub(crate) fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            base, deployment, operation, self.config.api_version
        )
    }

    /// POST a JSON body, retrying 429 and 5xx responses with exponential backoff.
    pub(crate) async fn post<Req, Resp>(&self, service: Service, url: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.post_once(service, url, body).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(%service, attempt = attempt + 1, ?delay, error = %e, "retrying request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn post_once<Req, Resp>(&self, service: Service, url: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!(%service, url, "sending request");

        let response = self
            .client
            .post(url)
            .header("api-key", self.config.api_key.as_str())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::network(service, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RagError::network(service, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|api_error| api_error.error.message)
                .unwrap_or(text);
            return Err(RagError::upstream(
                service,
                UpstreamKind::from_status(status.as_u16()),
                message,
            ));
        }

        serde_json::from_str(&text).map_err(|e| {
            RagError::LlmParse(format!(
                "Unexpected {} response: {}. Body: {}",
                service,
                e,
                text.chars().take(200).collect::<String>()
            ))
        })
    }
}

/// Delay before retry number `attempt + 1`.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.min(16))
}
