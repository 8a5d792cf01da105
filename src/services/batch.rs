//! Concurrent batch loading with isolated per-document failures.
//!
//! Documents are processed in consecutive groups. Inside a group every
//! insert runs concurrently; groups are strictly sequential with a
//! fixed pacing delay between them, bounding outstanding provider and
//! store calls to one group's size. This is the only layer that catches
//! errors instead of propagating them: one document's failure never
//! aborts its siblings or later groups.

use std::sync::Arc;

use tracing::{info, warn};

use crate::models::{BatchFailure, BatchResult, DocumentInput, LoadOptions};
use crate::services::pipeline::Pipeline;

pub struct BatchLoader {
    pipeline: Arc<Pipeline>,
}

impl BatchLoader {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Drive `Pipeline::insert` over `documents` per `options`.
    ///
    /// In dry-run mode documents are validated but neither the embedding
    /// provider nor the store is touched. The failure list preserves
    /// input order.
    pub async fn load(&self, documents: Vec<DocumentInput>, options: &LoadOptions) -> BatchResult {
        let total = documents.len();
        let batch_size = options.batch_size.max(1);

        if options.dry_run {
            info!("dry run mode, no documents will be inserted");
        }
        info!(documents = total, batch_size, "starting batch load");

        let mut result = BatchResult::default();
        let indexed: Vec<(usize, DocumentInput)> = documents.into_iter().enumerate().collect();
        let group_count = indexed.len().div_ceil(batch_size);

        for (group_number, group) in indexed.chunks(batch_size).enumerate() {
            info!(
                group = group_number + 1,
                groups = group_count,
                documents = group.len(),
                "processing group"
            );

            let mut handles = Vec::with_capacity(group.len());
            for (index, document) in group.iter().cloned() {
                let pipeline = self.pipeline.clone();
                let db_name = options.db_name.clone();
                let dry_run = options.dry_run;
                handles.push((
                    index,
                    tokio::spawn(async move {
                        insert_one(&pipeline, &document, dry_run, db_name.as_deref()).await
                    }),
                ));
            }

            for (index, handle) in handles {
                result.processed += 1;
                match handle.await {
                    Ok(Ok(())) => result.succeeded += 1,
                    Ok(Err(error)) => {
                        warn!(index, error = %error, "document failed");
                        result.failed += 1;
                        result.failures.push(BatchFailure { index, error });
                    }
                    Err(join_error) => {
                        warn!(index, error = %join_error, "insert task failed");
                        result.failed += 1;
                        result.failures.push(BatchFailure {
                            index,
                            error: join_error.to_string(),
                        });
                    }
                }
            }

            if group_number + 1 < group_count {
                tokio::time::sleep(options.pacing).await;
            }
        }

        info!(
            processed = result.processed,
            succeeded = result.succeeded,
            failed = result.failed,
            "batch load complete"
        );

        result
    }
}

async fn insert_one(
    pipeline: &Pipeline,
    document: &DocumentInput,
    dry_run: bool,
    db_name: Option<&str>,
) -> Result<(), String> {
    if document.text.trim().is_empty() {
        return Err("document text is empty".to_string());
    }

    if dry_run {
        return Ok(());
    }

    pipeline
        .insert(&document.text, document.metadata.as_ref(), db_name)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}
