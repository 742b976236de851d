//! Local JSONL tracking sink: `<dir>/<experiment>/runs.jsonl`, one line per run.

use super::{ExperimentTracker, RunRecord};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub const RUNS_FILENAME: &str = "runs.jsonl";

/// Appends run records to per-experiment JSONL files.
pub struct FileTracker {
    dir: PathBuf,
    /// Serializes appends from concurrent callers.
    write_lock: Mutex<()>,
}

impl FileTracker {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// File that holds the runs of `experiment`.
    pub fn runs_path(&self, experiment: &str) -> PathBuf {
        self.dir.join(sanitize(experiment)).join(RUNS_FILENAME)
    }
}

#[async_trait]
impl ExperimentTracker for FileTracker {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        let path = self.runs_path(&run.experiment);
        let mut line = serde_json::to_string(run)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RagError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| RagError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| RagError::io(&path, e))?;
        file.flush().await.map_err(|e| RagError::io(&path, e))?;

        debug!(experiment = %run.experiment, run = %run.run_name, path = %path.display(), "run recorded");
        Ok(())
    }
}

/// Keep experiment names usable as a single path component.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}
