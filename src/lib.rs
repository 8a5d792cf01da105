pub mod cli;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{ConfigError, EmbeddingError, LoadError, PipelineError, StoreError};
pub use models::{Config, OutputFormat};
