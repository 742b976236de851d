//! Persistence layer for saving/loading vector indexes.
//!
//! An index is stored as a directory holding two files:
//! - `index_meta.json`: human-readable [`IndexMetadata`] (provenance)
//! - `index.bin`: bincode-encoded chunks and embeddings

use crate::error::{RagError, Result};
use crate::index::{INDEX_FORMAT_VERSION, IndexEntry, IndexMetadata, VectorIndex};
use crate::llm::Embedder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File holding the encoded entries.
pub const ENTRIES_FILENAME: &str = "index.bin";

/// File holding the metadata.
pub const METADATA_FILENAME: &str = "index_meta.json";

fn entries_path(dir: &Path) -> PathBuf {
    dir.join(ENTRIES_FILENAME)
}

fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILENAME)
}

/// Save a VectorIndex into `dir`, creating it if needed.
pub fn save_index(index: &VectorIndex, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;

    let config = bincode::config::standard();
    let data = bincode::encode_to_vec(index.entries(), config)
        .map_err(|e| RagError::Serialization(e.to_string()))?;
    let path = entries_path(dir);
    fs::write(&path, &data).map_err(|e| RagError::io(&path, e))?;

    let meta = serde_json::to_string_pretty(index.metadata())?;
    let path = metadata_path(dir);
    fs::write(&path, meta).map_err(|e| RagError::io(&path, e))?;

    info!(path = %dir.display(), chunks = index.len(), "vector index saved");
    Ok(())
}

/// Read only the metadata of a persisted index.
pub fn load_metadata(dir: &Path) -> Result<IndexMetadata> {
    let path = metadata_path(dir);
    if !path.is_file() {
        return Err(RagError::IndexNotFound(dir.to_path_buf()));
    }

    let content = fs::read_to_string(&path).map_err(|e| RagError::io(&path, e))?;
    let metadata: IndexMetadata = serde_json::from_str(&content)?;

    if metadata.format_version != INDEX_FORMAT_VERSION {
        return Err(RagError::IndexMismatch(format!(
            "unsupported index format version {} (expected {})",
            metadata.format_version, INDEX_FORMAT_VERSION
        )));
    }

    Ok(metadata)
}

/// Load a VectorIndex from `dir`.
pub fn load_index(dir: &Path) -> Result<VectorIndex> {
    let metadata = load_metadata(dir)?;

    let path = entries_path(dir);
    if !path.is_file() {
        return Err(RagError::IndexNotFound(dir.to_path_buf()));
    }
    let data = fs::read(&path).map_err(|e| RagError::io(&path, e))?;

    let config = bincode::config::standard();
    let (entries, _): (Vec<IndexEntry>, usize) = bincode::decode_from_slice(&data, config)
        .map_err(|e| RagError::Serialization(e.to_string()))?;

    VectorIndex::from_parts(metadata, entries)
}

/// Load an index and check it was built with `embedding_model`.
pub fn load_index_for_model(dir: &Path, embedding_model: &str) -> Result<VectorIndex> {
    let index = load_index(dir)?;
    if index.metadata().embedding_model != embedding_model {
        return Err(RagError::IndexMismatch(format!(
            "index at '{}' was built with embedding model '{}' but '{}' is configured",
            dir.display(),
            index.metadata().embedding_model,
            embedding_model
        )));
    }
    Ok(index)
}

/// Load an index and check it against `embedder`: model name first, then the
/// dimension of one sample embedding. Rejects a wrong index before any query.
pub async fn load_index_for_embedder(dir: &Path, embedder: &dyn Embedder) -> Result<VectorIndex> {
    let index = load_index_for_model(dir, embedder.model_name())?;
    index.verify_embedder(embedder).await?;
    Ok(index)
}

/// Check if an index exists in the given directory.
pub fn index_exists(dir: &Path) -> bool {
    entries_path(dir).is_file() && metadata_path(dir).is_file()
}

/// Get the on-disk size of an index in bytes.
pub fn index_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for path in [entries_path(dir), metadata_path(dir)] {
        let metadata = fs::metadata(&path).map_err(|e| RagError::io(&path, e))?;
        total += metadata.len();
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkConfig};
    use crate::testing::HashEmbedder;
    use tempfile::TempDir;

    fn create_test_index() -> VectorIndex {
        let mut index = VectorIndex::new("text-embedding-ada-002", ChunkConfig::default());
        let texts = [
            ("Employees receive 20 vacation days annually.", vec![0.9, 0.1, 0.0]),
            ("Remote work is allowed two days per week.", vec![0.1, 0.9, 0.0]),
            ("Sick leave requires a medical certificate.", vec![0.0, 0.2, 0.8]),
        ];
        for (i, (text, embedding)) in texts.into_iter().enumerate() {
            let chunk = Chunk {
                index: i,
                source: "handbook.pdf".to_string(),
                page: i as u32 + 1,
                start_char: 0,
                text: text.to_string(),
            };
            index.insert(chunk, embedding).unwrap();
        }
        index
    }

    #[test]
    fn test_save_and_load_round_trip_search() {
        let dir = TempDir::new().unwrap();
        let original = create_test_index();
        save_index(&original, dir.path()).unwrap();
        assert!(index_exists(dir.path()));

        let loaded = load_index(dir.path()).unwrap();
        assert_eq!(loaded.metadata(), original.metadata());
        assert_eq!(loaded.entries(), original.entries());

        let query = [0.7, 0.3, 0.1];
        assert_eq!(
            loaded.search(&query, 3).unwrap(),
            original.search(&query, 3).unwrap()
        );
    }

    #[test]
    fn test_metadata_is_readable_json() {
        let dir = TempDir::new().unwrap();
        save_index(&create_test_index(), dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join(METADATA_FILENAME)).unwrap();
        assert!(content.contains("text-embedding-ada-002"));
        assert!(content.contains("\"dimension\": 3"));
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_index(Path::new("/nonexistent/vectorstore"));
        assert!(matches!(result, Err(RagError::IndexNotFound(_))));
    }

    #[test]
    fn test_load_rejects_other_model() {
        let dir = TempDir::new().unwrap();
        save_index(&create_test_index(), dir.path()).unwrap();

        assert!(load_index_for_model(dir.path(), "text-embedding-ada-002").is_ok());
        assert!(matches!(
            load_index_for_model(dir.path(), "text-embedding-3-large"),
            Err(RagError::IndexMismatch(_))
        ));
    }

    #[test]
    fn test_load_rejects_tampered_dimension() {
        let dir = TempDir::new().unwrap();
        save_index(&create_test_index(), dir.path()).unwrap();

        let path = dir.path().join(METADATA_FILENAME);
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\"dimension\": 3", "\"dimension\": 1536")).unwrap();

        assert!(matches!(
            load_index(dir.path()),
            Err(RagError::DimensionMismatch { expected: 1536, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_load_for_embedder_checks_dimension() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new("hash-embedder", ChunkConfig::default());
        let chunk = Chunk {
            index: 0,
            source: "handbook.pdf".to_string(),
            page: 1,
            start_char: 0,
            text: "Employees receive 20 vacation days annually.".to_string(),
        };
        index.insert(chunk, vec![1.0; 256]).unwrap();
        save_index(&index, dir.path()).unwrap();

        let matching = HashEmbedder::default();
        assert!(load_index_for_embedder(dir.path(), &matching).await.is_ok());

        let narrow = HashEmbedder { dimension: 8 };
        assert!(matches!(
            load_index_for_embedder(dir.path(), &narrow).await,
            Err(RagError::DimensionMismatch { expected: 256, actual: 8 })
        ));
    }

    #[test]
    fn test_index_size() {
        let dir = TempDir::new().unwrap();
        save_index(&create_test_index(), dir.path()).unwrap();
        assert!(index_size(dir.path()).unwrap() > 0);
    }
}
