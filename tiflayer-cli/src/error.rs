//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;
use tiflayer::config::ConfigError;
use tiflayer::{LayerError, TileError};

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Layer(#[from] LayerError),

    #[error("Tile error: {0}")]
    Tile(#[from] TileError),

    #[error("Invalid arguments: {0}")]
    Arguments(String),

    #[error("Timed out after {0}s waiting for the source")]
    Timeout(u64),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to start runtime: {0}")]
    Runtime(String),
}
