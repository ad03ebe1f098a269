//! Error types for project persistence.

use lumen_core::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while saving or loading a project.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Failed to read a project file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a project file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON
    #[error("failed to parse project: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document is from a newer format than this runtime understands
    #[error("unsupported project version {0}")]
    UnsupportedVersion(u64),

    /// Structural validation failed; nothing was loaded
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// The engine rejected the document
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ProjectError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProjectError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProjectError::WriteFile {
            path: path.into(),
            source,
        }
    }
}
