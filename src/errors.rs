// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The input artifact could not be allocated (directory or write failure).
    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Source too large: {size} bytes (limit {limit})")]
    SourceTooLarge { size: usize, limit: usize },

    #[error("Timed out after {:.1}s", .0.as_secs_f64())]
    ExecutionTimeout(Duration),

    #[error("Tool failure: {0}")]
    ToolFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunnerError>;
