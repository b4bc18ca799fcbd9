//! Application level errors for kklib-rs tools
//!
//! Library calls report [`KkError`]; the tools additionally deal with
//! configuration and output files.

use crate::config::ConfigError;
use crate::kk::KkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Vendor library failure
    #[error("KK library error: {0}")]
    Kk(#[from] KkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error (output files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
