//! Offline index build.
//!
//! Runs the ingestion pipeline end to end:
//! 1. Load every PDF in the documents directory
//! 2. Split the pages into overlapping chunks
//! 3. Embed the chunks and build the vector index
//! 4. Persist the index and record the build as a tracking run

use crate::chunk::{ChunkConfig, split_pages};
use crate::document::{Document, all_pages, load_documents};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::llm::Embedder;
use crate::persistence::save_index;
use crate::tracking::{ExperimentTracker, RunRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Experiment that index builds are recorded under.
pub const BUILD_EXPERIMENT: &str = "vectorstore_tracking";

/// Run name of an index build.
pub const BUILD_RUN_NAME: &str = "vectorstore_build";

/// Options for an index build.
#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Directory scanned for PDFs.
    pub documents_dir: PathBuf,
    /// Directory the index is written to.
    pub index_dir: PathBuf,
    pub chunk_config: ChunkConfig,
}

/// Summary of a finished build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub n_documents: usize,
    pub n_pages: usize,
    pub n_chunks: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub index_dir: PathBuf,
    pub elapsed_secs: f64,
}

/// Builds and persists the vector index.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    tracker: Arc<dyn ExperimentTracker>,
    options: IndexerOptions,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        tracker: Arc<dyn ExperimentTracker>,
        options: IndexerOptions,
    ) -> Self {
        Self {
            embedder,
            tracker,
            options,
        }
    }

    /// Load the documents directory and build, save and record the index.
    pub async fn run(&self) -> Result<(VectorIndex, BuildStats)> {
        let documents = load_documents(&self.options.documents_dir)?;
        self.build_from_documents(&documents).await
    }

    /// Build, save and record the index for already-loaded documents.
    pub async fn build_from_documents(
        &self,
        documents: &[Document],
    ) -> Result<(VectorIndex, BuildStats)> {
        let start = Instant::now();
        let config = self.options.chunk_config;

        let pages = all_pages(documents);
        let chunks = split_pages(&pages, &config)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus(self.options.documents_dir.clone()));
        }

        info!(
            documents = documents.len(),
            pages = pages.len(),
            chunks = chunks.len(),
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            "documents split into chunks"
        );

        let index = VectorIndex::build(chunks, self.embedder.as_ref(), config, documents.len()).await?;
        save_index(&index, &self.options.index_dir)?;

        let stats = BuildStats {
            n_documents: documents.len(),
            n_pages: pages.len(),
            n_chunks: index.len(),
            dimension: index.dimension(),
            embedding_model: index.metadata().embedding_model.clone(),
            index_dir: self.options.index_dir.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        let run = RunRecord::new(BUILD_EXPERIMENT, BUILD_RUN_NAME)
            .param("chunk_size", config.chunk_size)
            .param("chunk_overlap", config.chunk_overlap)
            .param("n_chunks", stats.n_chunks)
            .param("n_docs", stats.n_documents)
            .tag("vectorstore", self.options.index_dir.display())
            .finish();
        self.tracker.record(&run).await?;

        Ok((index, stats))
    }
}
