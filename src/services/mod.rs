mod batch;
mod chunker;
mod embedding;
mod pipeline;
mod store;

pub use batch::BatchLoader;
pub use chunker::TextChunker;
pub use embedding::{Embedding, EmbeddingBatch, EmbeddingClient, EmbeddingProvider, OpenAiProvider};
pub use pipeline::{MAX_TOP_K, Pipeline};
pub use store::{PreparedChunk, SqliteStore, StoreRegistry};
