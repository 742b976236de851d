//! Text embedding client.

use super::azure::AzureTransport;
use crate::config::AzureConfig;
use crate::error::{RagError, Result, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum inputs per embeddings request accepted by Azure OpenAI.
pub const MAX_BATCH_SIZE: usize = 16;

/// Converts text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed several texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Deployment or model identifier recorded alongside persisted indexes.
    fn model_name(&self) -> &str;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::LlmParse("Embedding response was empty".to_string()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Azure OpenAI embeddings client.
#[derive(Clone)]
pub struct AzureEmbeddingClient {
    transport: AzureTransport,
    deployment: String,
}

impl AzureEmbeddingClient {
    /// Create a client for the configured embeddings deployment.
    pub fn new(config: AzureConfig) -> Result<Self> {
        let deployment = config.embeddings_deployment.clone();
        Ok(Self {
            transport: AzureTransport::new(config)?,
            deployment,
        })
    }

    fn endpoint(&self) -> String {
        self.transport.deployment_url(&self.deployment, "embeddings")
    }

    async fn embed_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest { input: texts };
        let response: EmbeddingResponse = self
            .transport
            .post(Service::Embeddings, &self.endpoint(), &request)
            .await?;

        into_ordered_vectors(response, texts.len())
    }
}

#[async_trait]
impl Embedder for AzureEmbeddingClient {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            deployment = %self.deployment,
            batch_size = texts.len(),
            "embedding batch"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }
}

/// Reorder response items by their `index` and check the count.
fn into_ordered_vectors(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(RagError::LlmParse(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}
