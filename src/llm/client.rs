//! Chat completion client.
//!
//! [`ChatModel`] is the seam the retrieval chain and the grader talk to;
//! [`AzureChatClient`] implements it against an Azure OpenAI deployment.

use super::azure::AzureTransport;
use crate::config::AzureConfig;
use crate::error::{RagError, Result, Service};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Response from an LLM call including metadata.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage (if available).
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chat-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a full conversation and return the first choice.
    async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse>;

    /// Deployment or model identifier, for logging and tracking.
    fn model_name(&self) -> &str;

    /// Convenience method: single user message with optional system prompt.
    async fn complete(&self, system: Option<&str>, user: &str) -> Result<String> {
        let mut messages = Vec::new();

        if let Some(sys) = system {
            messages.push(Message::system(sys));
        }
        messages.push(Message::user(user));

        let response = self.chat(messages).await?;
        Ok(response.content)
    }
}

/// Request body for chat completion. The deployment is part of the URL.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    /// Null when the content filter suppressed the answer.
    #[serde(default)]
    content: Option<String>,
}

/// Azure OpenAI chat-completion client.
#[derive(Clone)]
pub struct AzureChatClient {
    transport: AzureTransport,
    deployment: String,
}

impl AzureChatClient {
    /// Create a client for the configured chat deployment.
    pub fn new(config: AzureConfig) -> Result<Self> {
        let deployment = config.chat_deployment.clone();
        Ok(Self {
            transport: AzureTransport::new(config)?,
            deployment,
        })
    }

    fn endpoint(&self) -> String {
        self.transport
            .deployment_url(&self.deployment, "chat/completions")
    }

    /// Test connectivity to the API.
    pub async fn test_connection(&self) -> Result<()> {
        let reply = self
            .complete(None, "Say 'hello' and nothing else.")
            .await?;

        if reply.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(RagError::LlmParse(format!("Unexpected response: {}", reply)))
        }
    }
}

#[async_trait]
impl ChatModel for AzureChatClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let config = self.transport.config();
        let request = ChatCompletionRequest {
            messages: &messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let completion: ChatCompletionResponse = self
            .transport
            .post(Service::Chat, &self.endpoint(), &request)
            .await?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::LlmParse("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: completion.usage,
        })
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }
}
