//! Ingestion and retrieval pipeline.
//!
//! Insert: text -> chunker -> embeddings (one batched call) -> one
//! atomic store write. Query: text -> embedding (single call) -> nearest
//! neighbor search. Every operation fails fast; there are no partial
//! writes.

use std::sync::Arc;

use tracing::info;

use crate::error::{ConfigError, PipelineError};
use crate::models::{Config, DeleteOutcome, InsertOutcome, Metadata, SearchResults};
use crate::services::chunker::TextChunker;
use crate::services::embedding::EmbeddingClient;
use crate::services::store::{PreparedChunk, StoreRegistry};
use crate::utils::ulid;

/// Upper bound on requested result counts.
pub const MAX_TOP_K: u32 = 100;

pub struct Pipeline {
    chunker: TextChunker,
    embeddings: EmbeddingClient,
    stores: Arc<StoreRegistry>,
    max_document_chars: usize,
    default_top_k: u32,
}

impl Pipeline {
    pub fn new(
        chunker: TextChunker,
        embeddings: EmbeddingClient,
        stores: Arc<StoreRegistry>,
        max_document_chars: usize,
        default_top_k: u32,
    ) -> Self {
        Self {
            chunker,
            embeddings,
            stores,
            max_document_chars,
            default_top_k,
        }
    }

    /// Build a pipeline from configuration, using the OpenAI-compatible
    /// embedding provider.
    pub fn from_config(config: &Config, stores: Arc<StoreRegistry>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TextChunker::new(&config.chunking),
            EmbeddingClient::from_config(&config.embedding)?,
            stores,
            config.chunking.max_document_chars as usize,
            config.search.default_top_k,
        ))
    }

    /// Insert a document: chunk, embed, and write all chunks atomically
    /// under a freshly generated document id.
    pub async fn insert(
        &self,
        text: &str,
        metadata: Option<&Metadata>,
        db_name: Option<&str>,
    ) -> Result<InsertOutcome, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::Validation("text cannot be empty".to_string()));
        }
        let length = text.chars().count();
        if length > self.max_document_chars {
            return Err(PipelineError::Validation(format!(
                "text cannot exceed {} characters",
                self.max_document_chars
            )));
        }

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(PipelineError::EmptyChunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch = self.embeddings.embed_many(&texts).await?;

        let doc_id = ulid::generate();
        let metadata_json = metadata
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PipelineError::Validation(format!("invalid metadata: {e}")))?;

        let prepared: Vec<PreparedChunk> = chunks
            .into_iter()
            .zip(batch.vectors)
            .map(|(chunk, vector)| PreparedChunk {
                index: chunk.index,
                text: chunk.text,
                vector,
                metadata: metadata_json.clone(),
            })
            .collect();

        let store = self.stores.open(db_name)?;
        store.insert_chunks(&doc_id, &prepared)?;

        info!(
            doc_id = %doc_id,
            chunks = prepared.len(),
            tokens = batch.total_tokens,
            "document inserted"
        );

        Ok(InsertOutcome {
            doc_id,
            chunk_count: prepared.len() as u32,
        })
    }

    /// Find the chunks nearest to a query text.
    pub async fn find(
        &self,
        query: &str,
        top_k: Option<u32>,
        db_name: Option<&str>,
    ) -> Result<SearchResults, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::Validation(
                "query text cannot be empty".to_string(),
            ));
        }

        let top_k = top_k.unwrap_or(self.default_top_k);
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(PipelineError::Validation(format!(
                "top_k must be between 1 and {MAX_TOP_K}"
            )));
        }

        let embedding = self.embeddings.embed_one(query).await?;
        let store = self.stores.open(db_name)?;
        let results = store.search(&embedding.vector, top_k as usize)?;

        info!(
            results = results.len(),
            tokens = embedding.token_count,
            "similarity search completed"
        );

        Ok(SearchResults { results })
    }

    /// Delete every chunk of a document.
    pub async fn delete(
        &self,
        doc_id: &str,
        db_name: Option<&str>,
    ) -> Result<DeleteOutcome, PipelineError> {
        if !ulid::is_valid(doc_id) {
            return Err(PipelineError::Validation(
                "invalid document id format".to_string(),
            ));
        }

        let store = self.stores.open(db_name)?;
        let deleted_chunks = store.delete_by_doc_id(doc_id)?;

        info!(doc_id = %doc_id, deleted_chunks, "document deleted");

        Ok(DeleteOutcome { deleted_chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::{EmbeddingError, StoreError};
    use crate::models::{ChunkingConfig, StoreConfig};
    use crate::services::embedding::{EmbeddingBatch, EmbeddingProvider};

    const DIM: usize = 4;

    /// Deterministic provider: the same text always maps to the same
    /// vector, and distinct texts land far apart.
    struct HashingProvider {
        calls: AtomicU32,
    }

    impl HashingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
            })
        }

        fn vector_for(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; DIM];
            for (i, b) in text.bytes().enumerate() {
                v[i % DIM] += f32::from(b) / 255.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for HashingProvider {
        async fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingBatch {
                vectors: texts.iter().map(|t| Self::vector_for(t)).collect(),
                total_tokens: texts.len() as u64,
            })
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        pipeline: Pipeline,
        stores: Arc<StoreRegistry>,
        provider: Arc<HashingProvider>,
    }

    fn fixture() -> Fixture {
        fixture_with_chunking(ChunkingConfig::default())
    }

    fn fixture_with_chunking(chunking: ChunkingConfig) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let stores = Arc::new(StoreRegistry::new(
            &StoreConfig {
                data_dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
            DIM,
        ));
        let provider = HashingProvider::new();
        let pipeline = Pipeline::new(
            TextChunker::new(&chunking),
            EmbeddingClient::new(provider.clone(), 100),
            stores.clone(),
            100_000,
            10,
        );
        Fixture {
            _dir: dir,
            pipeline,
            stores,
            provider,
        }
    }

    #[tokio::test]
    async fn test_insert_validates_empty_text() {
        let f = fixture();
        let err = f.pipeline.insert("   ", None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_insert_validates_oversized_text() {
        let f = fixture();
        let huge = "a".repeat(100_001);
        let err = f.pipeline.insert(&huge, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_insert_returns_doc_id_and_chunk_count() {
        let f = fixture();
        let outcome = f
            .pipeline
            .insert("A short document about nothing much.", None, None)
            .await
            .expect("insert");
        assert!(ulid::is_valid(&outcome.doc_id));
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_insert_chunk_indices_contiguous_in_store() {
        let f = fixture_with_chunking(ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 5,
            ..Default::default()
        });
        let text = "Sentences pile up here. More of them follow. And still more keep arriving now.";
        let outcome = f.pipeline.insert(text, None, None).await.expect("insert");
        assert!(outcome.chunk_count > 1);

        let store = f.stores.open(None).expect("store");
        let records = store.chunks_for_doc(&outcome.doc_id).expect("rows");
        assert_eq!(records.len() as u32, outcome.chunk_count);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.chunk_index, i as u32);
        }
    }

    #[tokio::test]
    async fn test_insert_persists_metadata_on_every_chunk() {
        let f = fixture();
        let mut metadata = Metadata::new();
        metadata.insert("category".to_string(), serde_json::json!("notes"));
        let outcome = f
            .pipeline
            .insert("Some text worth keeping.", Some(&metadata), None)
            .await
            .expect("insert");

        let store = f.stores.open(None).expect("store");
        let records = store.chunks_for_doc(&outcome.doc_id).expect("rows");
        for record in records {
            let json = record.metadata.expect("metadata present");
            assert!(json.contains("category"));
        }
    }

    #[tokio::test]
    async fn test_roundtrip_self_match_ranks_first() {
        let f = fixture();
        let text = "The mitochondria is the powerhouse of the cell.";
        let outcome = f.pipeline.insert(text, None, None).await.expect("insert");
        f.pipeline
            .insert("Rust ownership prevents data races at compile time.", None, None)
            .await
            .expect("insert");

        let results = f.pipeline.find(text, Some(2), None).await.expect("find");
        assert!(!results.is_empty());
        assert_eq!(results.results[0].doc_id, outcome.doc_id);
    }

    #[tokio::test]
    async fn test_find_validates_top_k() {
        let f = fixture();
        for top_k in [0, 101] {
            let err = f.pipeline.find("query", Some(top_k), None).await.unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_find_validates_empty_query() {
        let f = fixture();
        let err = f.pipeline.find("  ", None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(f.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_validates_id_format() {
        let f = fixture();
        let err = f.pipeline.delete("not-a-ulid", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_propagates_not_found() {
        let f = fixture();
        // Valid shape, but nothing stored under it.
        let err = f
            .pipeline
            .delete("01ARZ3NDEKTSV4RRFFQ69G5FAV", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Store(StoreError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_find_delete_scenario() {
        let f = fixture();
        let d1 = f
            .pipeline
            .insert("Cooking pasta requires salted boiling water.", None, None)
            .await
            .expect("insert d1");
        let d2 = f
            .pipeline
            .insert("Quantum entanglement links particle states.", None, None)
            .await
            .expect("insert d2");
        let d3 = f
            .pipeline
            .insert("Football teams field eleven players each.", None, None)
            .await
            .expect("insert d3");

        let hits = f
            .pipeline
            .find("Quantum entanglement links particle states.", Some(1), None)
            .await
            .expect("find");
        assert_eq!(hits.results[0].doc_id, d2.doc_id);

        let deleted = f.pipeline.delete(&d2.doc_id, None).await.expect("delete");
        assert!(deleted.deleted_chunks >= 1);

        let hits = f
            .pipeline
            .find("Quantum entanglement links particle states.", Some(2), None)
            .await
            .expect("find after delete");
        let doc_ids: Vec<&str> = hits.results.iter().map(|h| h.doc_id.as_str()).collect();
        assert!(!doc_ids.contains(&d2.doc_id.as_str()));
        assert!(doc_ids.contains(&d1.doc_id.as_str()));
        assert!(doc_ids.contains(&d3.doc_id.as_str()));
    }

    #[tokio::test]
    async fn test_named_store_not_found() {
        let f = fixture();
        let err = f
            .pipeline
            .find("query", None, Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(StoreError::NotFound(_))));
    }
}
