//! Create command implementation.

use anyhow::Result;
use clap::Args;

use crate::models::{Config, OutputFormat};
use crate::services::StoreRegistry;

/// Arguments for the create command.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Store name (letters, digits, underscores, and hyphens only)
    pub name: String,
}

pub async fn handle_create(args: CreateArgs, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let stores = StoreRegistry::new(&config.store, config.embedding.dimension as usize);

    let path = stores.create(&args.name)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "success": true, "db_path": path.display().to_string() })
        ),
        OutputFormat::Text => println!("Created store: {}", path.display()),
    }
    Ok(())
}
