//! Error types for cheatcode-index.

use std::path::PathBuf;

/// Errors that can occur while indexing or searching a project.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading or writing the persisted index.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A single source file could not be loaded.
    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A persisted index already exists at the target location.
    #[error("index already exists at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// No persisted index exists at the expected location.
    #[error("no index found at {}", .0.display())]
    NotInitialized(PathBuf),

    /// Embedding provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] cheatcode_llm::LlmError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid splitter, loader or retrieval settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Index was built with a different embedding model than the one querying it.
    #[error("index was built with embedding model {expected}, but {found} is configured")]
    EmbeddingMismatch { expected: String, found: String },

    /// Vector length does not match the index dimension.
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Persisted index uses a format version this build cannot read.
    #[error("unsupported index format version {0}")]
    UnsupportedVersion(u32),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Whether the failure came from a transient upstream condition.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Llm(e) if e.is_transient())
    }
}
