mod batch;
mod config;
mod document;
mod search;

pub use batch::{BatchFailure, BatchResult, LoadOptions};
pub use config::{
    ChunkingConfig, Config, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBEDDING_URL, DEFAULT_STORE_NAME, DistanceMetric, EmbeddingConfig, LoaderConfig,
    SearchConfig, StoreConfig, model_dimension_bounds,
};
pub use document::{ChunkRecord, DeleteOutcome, DocumentInput, InsertOutcome, Metadata, TextChunk};
pub use search::{OutputFormat, SearchHit, SearchResults};
