//! In-memory vector index over chunk embeddings.
//!
//! Similarity is cosine similarity, used both when ranking at query time and
//! when the index is checked after loading. Search is exhaustive over all
//! entries; results are ordered by decreasing score, ties keep insertion order.

use crate::chunk::{Chunk, ChunkConfig};
use crate::error::{RagError, Result};
use crate::llm::Embedder;
use crate::tracking::now_ms;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Version of the on-disk layout written by [`crate::persistence`].
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Chunks embedded per embedding request while building.
const BUILD_BATCH_SIZE: usize = 16;

/// A vector index entry.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Provenance recorded with a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    /// Embedding deployment/model that produced the vectors.
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub n_documents: usize,
    pub n_chunks: usize,
    /// Build time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

/// A chunk returned by a search together with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Vector search index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    metadata: IndexMetadata,
}

impl VectorIndex {
    /// Create an empty index for a given embedding model and chunking setup.
    pub fn new(embedding_model: impl Into<String>, chunk_config: ChunkConfig) -> Self {
        Self {
            entries: Vec::new(),
            metadata: IndexMetadata {
                format_version: INDEX_FORMAT_VERSION,
                embedding_model: embedding_model.into(),
                dimension: 0,
                chunk_size: chunk_config.chunk_size,
                chunk_overlap: chunk_config.chunk_overlap,
                n_documents: 0,
                n_chunks: 0,
                created_at_ms: now_ms(),
            },
        }
    }

    /// Reassemble an index from persisted parts, checking their consistency.
    pub fn from_parts(metadata: IndexMetadata, entries: Vec<IndexEntry>) -> Result<Self> {
        if metadata.n_chunks != entries.len() {
            return Err(RagError::IndexMismatch(format!(
                "metadata lists {} chunks but {} entries were stored",
                metadata.n_chunks,
                entries.len()
            )));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != metadata.dimension) {
            return Err(RagError::DimensionMismatch {
                expected: metadata.dimension,
                actual: bad.embedding.len(),
            });
        }

        Ok(Self { entries, metadata })
    }

    /// Embed every chunk and build an index over them.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        chunk_config: ChunkConfig,
        n_documents: usize,
    ) -> Result<Self> {
        let mut index = Self::new(embedder.model_name(), chunk_config);
        index.metadata.n_documents = n_documents;

        info!(
            chunks = chunks.len(),
            model = embedder.model_name(),
            "building vector index"
        );

        for batch in chunks.chunks(BUILD_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                index.insert(chunk.clone(), embedding)?;
            }
            debug!(embedded = index.len(), total = chunks.len(), "embedded batch");
        }

        Ok(index)
    }

    /// Append an entry. The first vector fixes the index dimension.
    pub fn insert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        if self.entries.is_empty() && self.metadata.dimension == 0 {
            self.metadata.dimension = embedding.len();
        } else if embedding.len() != self.metadata.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.metadata.dimension,
                actual: embedding.len(),
            });
        }

        self.entries.push(IndexEntry { chunk, embedding });
        self.metadata.n_chunks = self.entries.len();
        Ok(())
    }

    /// Return the `k` most similar chunks, most similar first.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(query_embedding.len())?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query_embedding, &entry.embedding)))
            .collect();

        // Stable sort: equal scores keep insertion order. NaN ranks last.
        let rank = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
        scored.sort_by(|a, b| rank(b.1).total_cmp(&rank(a.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Fail if vectors of `dimension` cannot be compared with this index.
    pub fn check_dimension(&self, dimension: usize) -> Result<()> {
        if self.metadata.dimension != 0 && dimension != self.metadata.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.metadata.dimension,
                actual: dimension,
            });
        }
        Ok(())
    }

    /// Check that `embedder` is the model that built this index and that its
    /// current output dimension matches. Costs one embedding call.
    pub async fn verify_embedder(&self, embedder: &dyn Embedder) -> Result<()> {
        if embedder.model_name() != self.metadata.embedding_model {
            return Err(RagError::IndexMismatch(format!(
                "index was built with embedding model '{}' but the client uses '{}'",
                self.metadata.embedding_model,
                embedder.model_name()
            )));
        }

        let sample = embedder.embed("dimension check").await?;
        self.check_dimension(sample.len())
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all entries.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn dimension(&self) -> usize {
        self.metadata.dimension
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
