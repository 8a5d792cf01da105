//! Embedding client for generating text embeddings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, EmbeddingError};
use crate::models::EmbeddingConfig;

/// A batch of vectors returned by a provider, with token accounting.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

/// A single embedded text.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub token_count: u64,
}

/// External capability that turns texts into fixed-dimension vectors.
///
/// A call either produces a vector for every input text or fails as a
/// whole; implementations never return partial batches.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch, EmbeddingError>;
}

/// Request body for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    usage: UsageData,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    total_tokens: u64,
}

/// Provider backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            ConfigError::Validation(
                "no API key configured (set OPENAI_API_KEY or embedding.api_key)".to_string(),
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimension,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!("status {status}: {body}")));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);

        Ok(EmbeddingBatch {
            vectors: data.into_iter().map(|d| d.embedding).collect(),
            total_tokens: parsed.usage.total_tokens,
        })
    }
}

/// Client wrapping a provider with batch-size enforcement.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    max_batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_batch_size: usize) -> Self {
        Self {
            provider,
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let provider = OpenAiProvider::new(config)?;
        Ok(Self::new(Arc::new(provider), config.batch_size as usize))
    }

    /// Embed a batch of texts.
    ///
    /// Empty input returns an empty batch without calling the provider.
    /// Inputs above the configured batch size fail before any provider
    /// call. There is no partial success: either every text produces a
    /// vector or the call fails entirely.
    pub async fn embed_many(&self, texts: &[String]) -> Result<EmbeddingBatch, EmbeddingError> {
        if texts.is_empty() {
            return Ok(EmbeddingBatch::default());
        }

        if texts.len() > self.max_batch_size {
            return Err(EmbeddingError::BatchTooLarge {
                got: texts.len(),
                max: self.max_batch_size,
            });
        }

        debug!(texts = texts.len(), "generating embeddings");
        self.provider.embed(texts).await
    }

    /// Embed a single text via a single-element batch.
    pub async fn embed_one(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let texts = [text.to_string()];
        let batch = self.embed_many(&texts).await?;
        let vector = batch
            .vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))?;
        Ok(Embedding {
            vector,
            token_count: batch.total_tokens,
        })
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Provider that records how many times it was called.
    struct CountingProvider {
        calls: AtomicU32,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingBatch {
                vectors: texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect(),
                total_tokens: texts.len() as u64 * 3,
            })
        }
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_call() {
        let provider = CountingProvider::new();
        let client = EmbeddingClient::new(provider.clone(), 8);

        let batch = client.embed_many(&[]).await.unwrap();
        assert!(batch.vectors.is_empty());
        assert_eq!(batch.total_tokens, 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_too_large_makes_no_call() {
        let provider = CountingProvider::new();
        let client = EmbeddingClient::new(provider.clone(), 2);

        let texts: Vec<String> = (0..3).map(|i| format!("text {i}")).collect();
        let err = client.embed_many(&texts).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::BatchTooLarge { got: 3, max: 2 }
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_embed_many_returns_vector_per_text() {
        let provider = CountingProvider::new();
        let client = EmbeddingClient::new(provider.clone(), 8);

        let texts = vec!["one".to_string(), "three".to_string()];
        let batch = client.embed_many(&texts).await.unwrap();
        assert_eq!(batch.vectors.len(), 2);
        assert_eq!(batch.vectors[0][0], 3.0);
        assert_eq!(batch.vectors[1][0], 5.0);
        assert_eq!(batch.total_tokens, 6);
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_openai_provider_base_url_trimming() {
        let config = EmbeddingConfig {
            base_url: "http://localhost:8080/".to_string(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(&config).expect("provider");
        assert_eq!(provider.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_embed_one() {
        let provider = CountingProvider::new();
        let client = EmbeddingClient::new(provider.clone(), 8);

        let embedding = client.embed_one("hello").await.unwrap();
        assert_eq!(embedding.vector, vec![5.0, 1.0]);
        assert_eq!(provider.calls(), 1);
    }
}
