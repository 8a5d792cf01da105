//! Vector store handles and the process-wide registry.
//!
//! Handles are opened lazily and cached per name for the life of the
//! registry. The registry is an explicit object passed by reference to
//! the pipeline and batch loader; it owns handle lifecycle, including
//! shutdown.

mod sqlite;

pub use sqlite::{PreparedChunk, SqliteStore};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::error::StoreError;
use crate::models::{DistanceMetric, StoreConfig};

/// Cache key for the default store.
const DEFAULT_KEY: &str = "";

pub struct StoreRegistry {
    data_dir: PathBuf,
    default_store: String,
    dimension: usize,
    metric: DistanceMetric,
    handles: Mutex<HashMap<String, Arc<SqliteStore>>>,
}

impl StoreRegistry {
    pub fn new(config: &StoreConfig, dimension: usize) -> Self {
        Self {
            data_dir: config.resolved_data_dir(),
            default_store: config.default_store.clone(),
            dimension,
            metric: config.metric,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SqliteStore>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a handle. `None` resolves the default store, initializing
    /// its backing file on first use; a named store must already exist.
    pub fn open(&self, name: Option<&str>) -> Result<Arc<SqliteStore>, StoreError> {
        match name {
            None => self.open_default(),
            Some(name) => self.open_named(name),
        }
    }

    fn open_default(&self) -> Result<Arc<SqliteStore>, StoreError> {
        let mut handles = self.lock();
        if let Some(store) = handles.get(DEFAULT_KEY) {
            return Ok(store.clone());
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.store_path(&self.default_store);
        info!(path = %path.display(), "opening default store");
        let store = Arc::new(SqliteStore::open(&path, self.dimension, self.metric)?);
        handles.insert(DEFAULT_KEY.to_string(), store.clone());
        Ok(store)
    }

    fn open_named(&self, name: &str) -> Result<Arc<SqliteStore>, StoreError> {
        validate_name(name)?;

        let mut handles = self.lock();
        if let Some(store) = handles.get(name) {
            return Ok(store.clone());
        }

        let path = self.store_path(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        info!(path = %path.display(), "opening named store");
        let store = Arc::new(SqliteStore::open(&path, self.dimension, self.metric)?);
        handles.insert(name.to_string(), store.clone());
        Ok(store)
    }

    /// Create a named store. Idempotent: an existing store is left as
    /// is and reported as success.
    pub fn create(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;

        let mut handles = self.lock();
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.store_path(name);
        if path.exists() {
            return Ok(path);
        }

        info!(path = %path.display(), "creating store");
        let store = Arc::new(SqliteStore::open(&path, self.dimension, self.metric)?);
        handles.insert(name.to_string(), store);
        Ok(path)
    }

    pub fn store_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.db"))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Drop every cached handle. Store operations hold each handle's
    /// connection lock for the full transaction, so no transaction is
    /// cut short by closing.
    pub fn close_all(&self) {
        let mut handles = self.lock();
        if !handles.is_empty() {
            info!(handles = handles.len(), "closing store handles");
        }
        handles.clear();
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
