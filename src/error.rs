//! Error types for the vector service.

use thiserror::Error;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("batch of {got} texts exceeds the maximum batch size of {max}")]
    BatchTooLarge { got: usize, max: usize },

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider error: {0}")]
    Provider(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    NotFound(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("invalid store name: {0} (only letters, digits, underscores, and hyphens are allowed)")]
    InvalidName(String),

    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    #[error("corrupt vector blob: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by pipeline operations.
///
/// Pipeline calls fail fast: the first error aborts the whole operation
/// with no partial writes. Callers match on the variant to tell local
/// validation failures apart from provider or storage faults.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("no chunks generated from text")]
    EmptyChunks,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    Path(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Errors related to loading documents from files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}
