//! Serve command implementation.

use std::sync::Arc;

use anyhow::Result;

use crate::models::Config;
use crate::server::StdioServer;
use crate::services::{Pipeline, StoreRegistry};

/// Run the stdio dispatcher until stdin closes.
pub async fn handle_serve() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let stores = Arc::new(StoreRegistry::new(
        &config.store,
        config.embedding.dimension as usize,
    ));
    let pipeline = Arc::new(Pipeline::from_config(&config, stores.clone())?);

    let server = StdioServer::new(pipeline, stores);
    server.run().await?;
    Ok(())
}
