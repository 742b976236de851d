//! RAG Assistant - retrieval-augmented question answering over HR documents.
//!
//! The crate ingests a directory of PDFs, splits the pages into overlapping
//! chunks, embeds them with a hosted Azure OpenAI deployment and persists a
//! vector index. Questions are answered by retrieving the closest chunks,
//! rendering a versioned prompt and calling the chat deployment. An
//! evaluation driver grades the answers to a labelled dataset with the chat
//! model and records every item as an experiment-tracking run.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_assistant::{
//!     chain::{ChainOptions, RetrievalChain},
//!     config::Config,
//!     llm::{AzureChatClient, AzureEmbeddingClient, PromptTemplate},
//!     persistence::load_index,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let prompt = PromptTemplate::load(&config.paths.prompts_dir, &config.pipeline.prompt_version)?;
//!     let index = load_index(&config.paths.index_dir)?;
//!
//!     let chain = RetrievalChain::new(
//!         Arc::new(index),
//!         Arc::new(AzureEmbeddingClient::new(config.azure.clone())?),
//!         Arc::new(AzureChatClient::new(config.azure.clone())?),
//!         prompt,
//!         ChainOptions { top_k: config.pipeline.top_k },
//!     );
//!
//!     let output = chain.invoke("What is the vacation policy?", &[]).await?;
//!     println!("{}", output.answer);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Document**: PDF loading into per-page records
//! - **Chunk**: fixed-width overlapping character windows
//! - **Embedder / ChatModel**: Azure OpenAI clients behind traits
//! - **VectorIndex**: cosine-similarity index with on-disk persistence
//! - **RetrievalChain**: retrieve, render, answer
//! - **Evaluator**: LLM-graded evaluation with experiment tracking

pub mod chain;
pub mod chunk;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod persistence;
pub mod tracking;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use chain::{ChainOptions, ChainOutput, ChatTurn, RetrievalChain};
pub use chunk::{Chunk, ChunkConfig};
pub use config::Config;
pub use document::{Document, Page};
pub use error::{RagError, Result};
pub use index::{ScoredChunk, VectorIndex};
pub use indexer::{Indexer, IndexerOptions};
pub use persistence::{load_index, load_index_for_embedder, save_index};
pub use tracking::{ExperimentTracker, RunRecord};
