// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobWatchError {
    #[error("Invalid pattern at index {index} ({pattern:?}): {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Failure reported by a user run (callback or deferred work).
    #[error("Run failed: {0:#}")]
    Run(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GlobWatchError {
    pub(crate) fn invalid_pattern(
        index: usize,
        pattern: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GlobWatchError::InvalidPattern {
            index,
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GlobWatchError>;
