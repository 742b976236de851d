//! Error types for the RAG assistant.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Which hosted service an upstream failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Chat,
    Embeddings,
    Tracking,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Chat => write!(f, "chat completion"),
            Service::Embeddings => write!(f, "embeddings"),
            Service::Tracking => write!(f, "experiment tracking"),
        }
    }
}

/// Classification of an upstream service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Connection, DNS or timeout failure.
    Network,
    /// 401 / 403.
    Auth,
    /// 429.
    RateLimit,
    /// Any other non-success status.
    Status(u16),
}

impl UpstreamKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => UpstreamKind::Auth,
            429 => UpstreamKind::RateLimit,
            other => UpstreamKind::Status(other),
        }
    }

    /// Whether the request is retried: 429 and 5xx only. Timeouts count as
    /// network failures and are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamKind::RateLimit => true,
            UpstreamKind::Status(code) => *code >= 500,
            UpstreamKind::Network | UpstreamKind::Auth => false,
        }
    }
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamKind::Network => write!(f, "network failure"),
            UpstreamKind::Auth => write!(f, "authentication failed"),
            UpstreamKind::RateLimit => write!(f, "rate limited"),
            UpstreamKind::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

/// Errors that can occur while indexing, answering or evaluating.
#[derive(Error, Debug)]
pub enum RagError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Required configuration values are absent.
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The documents directory does not exist or is not a directory.
    #[error("Documents directory '{0}' does not exist or is not a directory")]
    DocumentsNotFound(PathBuf),

    /// No text could be extracted from any document.
    #[error("No document text found in '{0}'")]
    EmptyCorpus(PathBuf),

    /// A PDF could not be parsed.
    #[error("Failed to read PDF '{path}': {message}")]
    Pdf { path: PathBuf, message: String },

    /// The prompt template file does not exist.
    #[error("Prompt not found at '{0}'")]
    PromptNotFound(PathBuf),

    /// The prompt template is missing a required placeholder.
    #[error("Invalid prompt template '{path}': missing placeholder {{{placeholder}}}")]
    InvalidPrompt { path: PathBuf, placeholder: String },

    /// The evaluation dataset file does not exist.
    #[error("Dataset not found at '{0}'")]
    DatasetNotFound(PathBuf),

    /// A dataset entry lacks a required field.
    #[error("Malformed dataset item #{index}: {message}")]
    MalformedItem { index: usize, message: String },

    /// The persisted index does not exist.
    #[error("Vector index not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// The persisted index was built with a different embedding setup.
    #[error("Vector index mismatch: {0}")]
    IndexMismatch(String),

    /// A vector does not have the dimension the index expects.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A hosted service call failed.
    #[error("Upstream {service} error ({kind}): {message}")]
    Upstream {
        service: Service,
        kind: UpstreamKind,
        message: String,
    },

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// Experiment tracking sink error.
    #[error("Tracking error: {0}")]
    Tracking(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an upstream error.
    pub fn upstream(service: Service, kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            kind,
            message: message.into(),
        }
    }

    /// Map a transport-level reqwest failure to an upstream error.
    pub fn network(service: Service, err: reqwest::Error) -> Self {
        Self::upstream(service, UpstreamKind::Network, err.to_string())
    }

    /// Whether this is an upstream failure worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Upstream { kind, .. } if kind.is_retryable())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
