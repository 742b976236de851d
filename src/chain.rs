//! Conversational retrieval chain.
//!
//! Answers a question by retrieving the closest chunks from a [`VectorIndex`],
//! rendering the versioned prompt with them, and calling the chat model.
//! When prior turns are supplied, the follow-up is first rewritten into a
//! standalone question so retrieval sees the full intent.

use crate::error::Result;
use crate::index::{ScoredChunk, VectorIndex};
use crate::llm::{ChatModel, Embedder, PromptTemplate, Prompts, fill_placeholders};
use std::sync::Arc;
use tracing::debug;

/// Separator between chunk texts in the rendered context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// One prior exchange in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Chain options.
#[derive(Debug, Clone, Copy)]
pub struct ChainOptions {
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// Result of one chain invocation.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// The question used for retrieval (rewritten when history was given).
    pub standalone_question: String,
    /// Generated answer text.
    pub answer: String,
    /// Retrieved chunk texts joined with [`CONTEXT_SEPARATOR`].
    pub context: String,
    /// Retrieved chunks with their scores, most similar first.
    pub sources: Vec<ScoredChunk>,
}

/// Retrieval-augmented question answering over a vector index.
pub struct RetrievalChain {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    options: ChainOptions,
}

impl RetrievalChain {
    /// Create a chain. The embedder must be the model the index was built with.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn ChatModel>,
        prompt: PromptTemplate,
        options: ChainOptions,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            prompt,
            options,
        }
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer `question`, taking `history` (oldest first) into account.
    pub async fn invoke(&self, question: &str, history: &[ChatTurn]) -> Result<ChainOutput> {
        let standalone_question = if history.is_empty() {
            question.to_string()
        } else {
            self.condense_question(question, history).await?
        };

        let sources = self.retrieve(&standalone_question).await?;
        let context = join_context(&sources);

        let rendered = self.prompt.render(&context, &standalone_question);
        let answer = self.llm.complete(None, &rendered).await?;

        debug!(
            prompt_version = self.prompt.version(),
            retrieved = sources.len(),
            answer_len = answer.len(),
            "chain answered question"
        );

        Ok(ChainOutput {
            standalone_question,
            answer: answer.trim().to_string(),
            context,
            sources,
        })
    }

    /// Retrieve the top chunks for a question.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed(question).await?;
        self.index.search(&query_embedding, self.options.top_k)
    }

    async fn condense_question(&self, question: &str, history: &[ChatTurn]) -> Result<String> {
        let chat_history = format_history(history);
        let prompt = fill_placeholders(
            Prompts::condense_question(),
            &[("chat_history", chat_history.as_str()), ("question", question)],
        );

        let rewritten = self.llm.complete(None, &prompt).await?;
        let rewritten = rewritten.trim();

        debug!(original = question, standalone = rewritten, "condensed follow-up question");

        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

/// Concatenate chunk texts in retrieval order.
pub fn join_context(sources: &[ScoredChunk]) -> String {
    sources
        .iter()
        .map(|s| s.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn format_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}
