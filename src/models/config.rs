use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_STORE_NAME: &str = "vectors";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vectord").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()
            .ok_or_else(|| ConfigError::Path("could not determine config directory".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Validate the whole configuration. Fatal at startup: an unsupported
    /// model or out-of-range dimensionality never becomes a runtime error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.chunking.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    100
}

fn default_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

/// Dimensionality bounds for the models the provider is known to serve.
pub fn model_dimension_bounds(model: &str) -> Option<(u32, u32)> {
    match model {
        "text-embedding-3-small" => Some((512, 1536)),
        "text-embedding-3-large" => Some((256, 3072)),
        "text-embedding-ada-002" => Some((1536, 1536)),
        _ => None,
    }
}

impl EmbeddingConfig {
    /// API key from the config file, or the OPENAI_API_KEY environment
    /// variable as a fallback.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = model_dimension_bounds(&self.model).ok_or_else(|| {
            ConfigError::Validation(format!(
                "unknown embedding model: {} (supported: text-embedding-3-small, \
                 text-embedding-3-large, text-embedding-ada-002)",
                self.model
            ))
        })?;

        if self.dimension < min || self.dimension > max {
            return Err(ConfigError::Validation(format!(
                "invalid dimension {} for model {} (valid range: {}-{})",
                self.dimension, self.model, min, max
            )));
        }

        if self.batch_size < 1 || self.batch_size > 2048 {
            return Err(ConfigError::Validation(format!(
                "invalid batch size: {} (must be between 1 and 2048)",
                self.batch_size
            )));
        }

        Ok(())
    }
}

/// Distance metric used to rank nearest neighbors. Constant for all
/// vectors in one store; similarity is reported as `1 - distance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the store files. Defaults to the platform data
    /// directory under `vectord/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_store_name")]
    pub default_store: String,

    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_store: default_store_name(),
            metric: DistanceMetric::Cosine,
        }
    }
}

impl StoreConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|p| p.join("vectord"))
                .unwrap_or_else(|| PathBuf::from("./data"))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    /// Maximum accepted document length in characters.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: u32,
}

fn default_chunk_size() -> u32 {
    700
}

fn default_chunk_overlap() -> u32 {
    100
}

fn default_max_document_chars() -> u32 {
    100_000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_document_chars: default_max_document_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_document_chars == 0 {
            return Err(ConfigError::Validation(
                "max_document_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
}

fn default_top_k() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_top_k == 0 || self.default_top_k > 100 {
            return Err(ConfigError::Validation(format!(
                "default_top_k must be between 1 and 100, got {}",
                self.default_top_k
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Documents inserted concurrently per group.
    #[serde(default = "default_loader_batch_size")]
    pub batch_size: u32,

    /// Delay between groups, to respect upstream rate limits.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_loader_batch_size() -> u32 {
    10
}

fn default_pacing_ms() -> u64 {
    1000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_loader_batch_size(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.base_url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.embedding.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.embedding.dimension, DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(config.chunking.chunk_size, 700);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.search.default_top_k, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let config = EmbeddingConfig {
            model: "text-embedding-9-huge".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_dimension_out_of_range_rejected() {
        let config = EmbeddingConfig {
            dimension: 64,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EmbeddingConfig {
            model: "text-embedding-3-large".to_string(),
            dimension: 3072,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        let config = EmbeddingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EmbeddingConfig {
            batch_size: 4096,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cosine_distance() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        let c = vec![0.0, 1.0];
        assert!(DistanceMetric::Cosine.distance(&a, &b).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((DistanceMetric::Euclidean.distance(&a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_model_dimension_bounds_table() {
        assert_eq!(
            model_dimension_bounds("text-embedding-3-small"),
            Some((512, 1536))
        );
        assert_eq!(
            model_dimension_bounds("text-embedding-ada-002"),
            Some((1536, 1536))
        );
        assert_eq!(model_dimension_bounds("nope"), None);
    }
}
