//! Batch load options and results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options controlling one batch load run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Documents inserted concurrently per group.
    pub batch_size: usize,
    /// Validate only; never touch the embedding provider or the store.
    pub dry_run: bool,
    /// Named store to load into; the default store when `None`.
    pub db_name: Option<String>,
    /// Delay between consecutive groups.
    pub pacing: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            dry_run: false,
            db_name: None,
            pacing: Duration::from_millis(1000),
        }
    }
}

/// One failed document: its position in the input and the error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

/// Aggregate outcome of a batch load run. Failures are listed in input
/// order and carry no partial per-chunk detail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}
