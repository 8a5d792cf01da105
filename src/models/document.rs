use serde::{Deserialize, Serialize};

/// Opaque document metadata: an arbitrary key-value map serialized as
/// JSON at the storage boundary. No schema is assumed or validated.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document to be ingested: raw text plus optional metadata.
///
/// A document has no stored form of its own; it exists only as the
/// grouping key of its chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DocumentInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata: Some(metadata),
        }
    }
}

/// One bounded segment of a document's normalized text, before
/// embedding. Indices are contiguous from 0 within the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub index: u32,
}

/// A chunk row as persisted on the metadata side of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: i64,
    pub doc_id: String,
    pub chunk_index: u32,
    pub text: String,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Outcome of a successful document insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub doc_id: String,
    pub chunk_count: u32,
}

/// Outcome of a successful document deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted_chunks: u64,
}
