//! Deterministic stand-ins for the hosted services, used by unit tests.

use crate::error::Result;
use crate::llm::{ChatModel, Embedder, LlmResponse, Message};
use crate::tracking::{ExperimentTracker, RunRecord};
use async_trait::async_trait;
use std::sync::Mutex;

/// Bag-of-words embedder: each lowercase word is hashed into one bucket.
pub struct HashEmbedder {
    pub dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl HashEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % self.dimension as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Chat model that replays canned replies in order, repeating the last one,
/// and records every conversation it receives.
pub struct ScriptedChat {
    replies: Vec<String>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(reply: &str) -> Self {
        Self::new(vec![reply.to_string()])
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let mut calls = self.calls.lock().unwrap();
        let n = calls.len();
        calls.push(messages);

        let content = self
            .replies
            .get(n)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            finish_reason: Some("stop".to_string()),
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        "scripted-chat"
    }
}

/// Tracker that keeps runs in memory.
#[derive(Default)]
pub struct MemoryTracker {
    runs: Mutex<Vec<RunRecord>>,
}

impl MemoryTracker {
    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExperimentTracker for MemoryTracker {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}
