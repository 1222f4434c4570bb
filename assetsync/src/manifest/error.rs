//! Error types for manifest parsing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors raised while loading a manifest or version file.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// The document is not valid JSON.
    #[error("malformed manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is valid JSON but not an object.
    #[error("manifest root must be a JSON object")]
    NotAnObject,

    /// The document is an empty object.
    #[error("manifest document is empty")]
    Empty,
}
