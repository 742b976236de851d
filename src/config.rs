//! Configuration for the RAG assistant.
//!
//! Values are resolved in this order (highest priority first):
//! 1. Process environment variables (a `.env` file in the working directory is loaded first)
//! 2. Config file (`~/.config/rag-assistant/config.yaml`)
//! 3. Default values
//!
//! Everything is validated eagerly: [`Config::validate`] reports every missing
//! required key in a single error before any service call is made.

use crate::chunk::ChunkConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_CHAT_DEPLOYMENT: &str = "AZURE_OPENAI_CHAT_DEPLOYMENT";
pub const ENV_EMBEDDINGS_DEPLOYMENT: &str = "AZURE_OPENAI_EMBEDDINGS_DEPLOYMENT";

pub const DEFAULT_API_VERSION: &str = "2023-05-15";
pub const DEFAULT_PROMPT_VERSION: &str = "v1_asistente_rrhh";

/// Hosted API settings shared by the chat and embedding clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Resource endpoint (e.g., "https://my-resource.openai.azure.com")
    pub endpoint: String,

    /// API key sent in the `api-key` header
    pub api_key: String,

    /// API version query parameter
    pub api_version: String,

    /// Deployment name of the chat model
    pub chat_deployment: String,

    /// Deployment name of the embedding model
    pub embeddings_deployment: String,

    /// Maximum tokens for chat responses
    pub max_tokens: u32,

    /// Sampling temperature (kept at 0 for reproducible answers)
    pub temperature: f32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Retries for rate-limited or 5xx responses
    pub max_retries: u32,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            chat_deployment: String::new(),
            embeddings_deployment: String::new(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Retrieval and prompting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub prompt_version: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Number of chunks handed to the chat model per question.
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prompt_version: DEFAULT_PROMPT_VERSION.to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            top_k: 4,
        }
    }
}

impl PipelineConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub documents_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub index_dir: PathBuf,
    pub dataset_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/pdfs"),
            prompts_dir: PathBuf::from("prompts"),
            index_dir: PathBuf::from("vectorstore"),
            dataset_path: PathBuf::from("tests/eval_dataset.json"),
        }
    }
}

/// Experiment tracking sink selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// MLflow server URI. When absent, runs are appended to local JSONL files.
    pub tracking_uri: Option<String>,
    /// Directory for the local JSONL sink.
    pub local_dir: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: None,
            local_dir: PathBuf::from("tracking"),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub azure: AzureConfig,
    pub pipeline: PipelineConfig,
    pub paths: PathsConfig,
    pub tracking: TrackingConfig,
}

impl Config {
    /// Load configuration from `.env`, the process environment and the optional config file.
    pub fn load() -> Result<Self> {
        Self::check_dotenv(dotenvy::dotenv())?;

        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Config::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Accept a loaded or absent `.env`; any other failure is a config error.
    fn check_dotenv(result: dotenvy::Result<PathBuf>) -> Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::Config(format!("Failed to load .env: {}", e))),
        }
    }

    /// Load configuration from a specific YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;

        serde_yaml::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-assistant")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Override values from an environment lookup.
    ///
    /// Unparseable numeric values are rejected instead of silently ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };

        text(ENV_ENDPOINT, &mut self.azure.endpoint);
        text(ENV_API_KEY, &mut self.azure.api_key);
        text(ENV_API_VERSION, &mut self.azure.api_version);
        text(ENV_CHAT_DEPLOYMENT, &mut self.azure.chat_deployment);
        text(ENV_EMBEDDINGS_DEPLOYMENT, &mut self.azure.embeddings_deployment);
        text("PROMPT_VERSION", &mut self.pipeline.prompt_version);

        if let Some(v) = parse_env(&lookup, "CHUNK_SIZE")? {
            self.pipeline.chunk_size = v;
        }
        if let Some(v) = parse_env(&lookup, "CHUNK_OVERLAP")? {
            self.pipeline.chunk_overlap = v;
        }
        if let Some(v) = parse_env(&lookup, "RETRIEVER_TOP_K")? {
            self.pipeline.top_k = v;
        }
        if let Some(v) = parse_env(&lookup, "LLM_TIMEOUT_SECS")? {
            self.azure.timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "LLM_MAX_RETRIES")? {
            self.azure.max_retries = v;
        }

        if let Some(uri) = lookup("MLFLOW_TRACKING_URI").filter(|u| !u.trim().is_empty()) {
            self.tracking.tracking_uri = Some(uri);
        }

        Ok(())
    }

    /// Validate that required configuration is present and consistent.
    pub fn validate(&self) -> Result<()> {
        let required = [
            (ENV_ENDPOINT, &self.azure.endpoint),
            (ENV_API_KEY, &self.azure.api_key),
            (ENV_CHAT_DEPLOYMENT, &self.azure.chat_deployment),
            (ENV_EMBEDDINGS_DEPLOYMENT, &self.azure.embeddings_deployment),
        ];

        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(RagError::MissingConfig(missing));
        }

        if self.azure.api_version.trim().is_empty() {
            return Err(RagError::InvalidConfig(format!(
                "{} must not be empty",
                ENV_API_VERSION
            )));
        }

        if self.pipeline.prompt_version.trim().is_empty() {
            return Err(RagError::InvalidConfig(
                "PROMPT_VERSION must not be empty".to_string(),
            ));
        }

        if self.pipeline.top_k == 0 {
            return Err(RagError::InvalidConfig(
                "RETRIEVER_TOP_K must be at least 1".to_string(),
            ));
        }

        self.pipeline.chunk_config().validate()
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        chat_deployment: impl Into<String>,
        embeddings_deployment: impl Into<String>,
    ) -> Self {
        Self {
            azure: AzureConfig {
                endpoint: endpoint.into(),
                api_key: api_key.into(),
                chat_deployment: chat_deployment.into(),
                embeddings_deployment: embeddings_deployment.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            RagError::InvalidConfig(format!("{} must be a non-negative integer, got '{}'", key, raw))
        }),
    }
}
