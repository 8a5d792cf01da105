//! Delete command implementation.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::models::{Config, OutputFormat};
use crate::services::{Pipeline, StoreRegistry};

/// Arguments for the delete command.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Document id to delete
    pub doc_id: String,

    /// Named store to delete from
    #[arg(long, short = 'd')]
    pub db: Option<String>,
}

pub async fn handle_delete(args: DeleteArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let stores = Arc::new(StoreRegistry::new(
        &config.store,
        config.embedding.dimension as usize,
    ));
    let pipeline = Pipeline::from_config(&config, stores)?;

    let outcome = pipeline.delete(&args.doc_id, args.db.as_deref()).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
        OutputFormat::Text => println!(
            "Deleted {} chunk(s) for document {}",
            outcome.deleted_chunks, args.doc_id
        ),
    }
    Ok(())
}
