//! SQLite-backed vector store.
//!
//! One store is one SQLite file holding two relations joined by a shared
//! row id: `chunk_vectors` (the embedding blobs) and `chunk_metadata`
//! (document id, chunk index, text, opaque metadata, timestamp).
//! Nearest-neighbor search scans the vector relation and ranks by the
//! configured metric.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use crate::error::StoreError;
use crate::models::{ChunkRecord, DistanceMetric, SearchHit};

/// Structural changes applied once, idempotently, in ascending order.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_init",
    r#"
    CREATE TABLE chunk_vectors (
        chunk_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        embedding  BLOB NOT NULL
    );

    CREATE TABLE chunk_metadata (
        chunk_id     INTEGER PRIMARY KEY REFERENCES chunk_vectors(chunk_id),
        doc_id       TEXT NOT NULL,
        chunk_index  INTEGER NOT NULL,
        text         TEXT NOT NULL,
        metadata     TEXT,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_chunk_metadata_doc_id ON chunk_metadata(doc_id);
    "#,
)];

/// A chunk prepared for storage.
#[derive(Debug, Clone)]
pub struct PreparedChunk {
    pub index: u32,
    pub text: String,
    pub vector: Vec<f32>,
    /// Metadata already serialized to JSON, inherited from the document.
    pub metadata: Option<String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    dimension: usize,
    metric: DistanceMetric,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if absent) the store file at `path` and bring its
    /// schema up to date.
    pub fn open(path: &Path, dimension: usize, metric: DistanceMetric) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            dimension,
            metric,
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )?;

        for (name, sql) in MIGRATIONS.iter().copied() {
            let applied: Option<i64> = conn
                .query_row(
                    "SELECT id FROM migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            if applied.is_some() {
                continue;
            }

            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute("INSERT INTO migrations (name) VALUES (?1)", params![name])?;
            tx.commit()?;
            info!(store = %self.path.display(), migration = name, "applied migration");
        }

        Ok(())
    }

    /// Write all chunks of one document as a single transaction: either
    /// every row becomes visible or none do. The vector row id doubles
    /// as the metadata row id.
    pub fn insert_chunks(&self, doc_id: &str, chunks: &[PreparedChunk]) -> Result<(), StoreError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        {
            let mut insert_vector = tx.prepare("INSERT INTO chunk_vectors (embedding) VALUES (?1)")?;
            let mut insert_metadata = tx.prepare(
                "INSERT INTO chunk_metadata (chunk_id, doc_id, chunk_index, text, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for chunk in chunks {
                if chunk.vector.len() != self.dimension {
                    return Err(StoreError::Dimension {
                        expected: self.dimension,
                        got: chunk.vector.len(),
                    });
                }
                insert_vector.execute(params![vector_to_blob(&chunk.vector)])?;
                let chunk_id = tx.last_insert_rowid();
                insert_metadata.execute(params![
                    chunk_id,
                    doc_id,
                    chunk.index,
                    chunk.text,
                    chunk.metadata,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Return up to `top_k` nearest entries, best match first.
    ///
    /// Distance ties are broken by ascending row id so that a call's
    /// ordering is deterministic.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::Dimension {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT v.chunk_id, v.embedding, m.doc_id, m.text
             FROM chunk_vectors v
             JOIN chunk_metadata m ON v.chunk_id = m.chunk_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (chunk_id, blob, doc_id, text) = row?;
            let vector = blob_to_vector(&blob, self.dimension)?;
            let distance = self.metric.distance(query, &vector);
            scored.push((distance, chunk_id, doc_id, text));
        }

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, chunk_id, doc_id, text)| SearchHit {
                chunk_id,
                doc_id,
                text,
                score: 1.0 - distance,
            })
            .collect())
    }

    /// Remove every chunk of a document atomically. Fails with
    /// `DocumentNotFound` (leaving storage unchanged) when the document
    /// has no chunks.
    pub fn delete_by_doc_id(&self, doc_id: &str) -> Result<u64, StoreError> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;

        let chunk_ids: Vec<i64> = {
            let mut select = tx.prepare("SELECT chunk_id FROM chunk_metadata WHERE doc_id = ?1")?;
            let ids = select
                .query_map(params![doc_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            ids
        };

        if chunk_ids.is_empty() {
            return Err(StoreError::DocumentNotFound(doc_id.to_string()));
        }

        let deleted = {
            let mut delete_vector = tx.prepare("DELETE FROM chunk_vectors WHERE chunk_id = ?1")?;
            for chunk_id in &chunk_ids {
                delete_vector.execute(params![chunk_id])?;
            }
            tx.execute("DELETE FROM chunk_metadata WHERE doc_id = ?1", params![doc_id])?
        };

        tx.commit()?;
        Ok(deleted as u64)
    }

    /// Total number of chunk rows in the store.
    pub fn count_chunks(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunk_metadata", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// All chunk rows of one document, ordered by chunk index.
    pub fn chunks_for_doc(&self, doc_id: &str) -> Result<Vec<ChunkRecord>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT chunk_id, doc_id, chunk_index, text, metadata, created_at
             FROM chunk_metadata WHERE doc_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![doc_id], |row| {
            Ok(ChunkRecord {
                chunk_id: row.get(0)?,
                doc_id: row.get(1)?,
                chunk_index: row.get(2)?,
                text: row.get(3)?,
                metadata: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>, StoreError> {
    if blob.len() != dimension * 4 {
        return Err(StoreError::Corrupt(format!(
            "expected {} bytes, got {}",
            dimension * 4,
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
