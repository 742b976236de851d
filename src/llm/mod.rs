//! LLM integration module.
//!
//! Provides the Azure OpenAI chat and embedding clients, the traits the rest
//! of the crate depends on, and the prompt templates.

mod azure;
mod client;
mod embeddings;
mod prompts;

pub use client::{AzureChatClient, ChatModel, LlmResponse, Message, Role, TokenUsage};
pub use embeddings::{AzureEmbeddingClient, Embedder, MAX_BATCH_SIZE};
pub use prompts::{PromptTemplate, Prompts, fill_placeholders};
