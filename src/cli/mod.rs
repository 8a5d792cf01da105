//! CLI module for the vector service.

pub mod commands;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Semantic document service: chunking, embeddings, and similarity
/// search over embedded SQLite stores.
#[derive(Debug, Parser)]
#[command(name = "vectord")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve line-delimited JSON requests on stdin/stdout
    Serve,

    /// Load documents from a file through the batch loader
    Load(commands::LoadArgs),

    /// Create a named store
    Create(commands::CreateArgs),

    /// Search indexed documents
    Search(commands::SearchArgs),

    /// Delete a document and all its chunks
    Delete(commands::DeleteArgs),
}
