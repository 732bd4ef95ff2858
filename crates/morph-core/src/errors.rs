//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading context or rule documents.
#[derive(Debug, Error)]
pub enum MorphError {
    /// A rule definition file could not be read.
    #[error("failed to read rule file {}: {source}", path.display())]
    RuleFile {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A rule or context document was not valid JSON for the data model.
    #[error("failed to parse document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, MorphError>;
