//! Error types for the assets manager.

use thiserror::Error;

use crate::config::ConfigError;
use crate::download::DownloadError;
use crate::manifest::ManifestError;
use crate::storage::StorageError;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors returned by [`AssetsManager`](super::AssetsManager) maintenance calls.
///
/// Failures inside the update protocol are never returned; they roll the
/// state machine back and surface as [`UpdateEvent::Error`](super::UpdateEvent::Error)
/// notifications instead.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Neither the cached nor the bundled manifest could be loaded.
    #[error("no local manifest could be loaded from {0}")]
    NoLocalManifest(String),

    /// A storage-root operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A manifest could not be read or parsed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The HTTP transport could not be built.
    #[error("transport setup failed: {0}")]
    Transport(#[from] DownloadError),

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_local_manifest_display() {
        let err = ManagerError::NoLocalManifest("/app/project.manifest".to_string());
        assert_eq!(
            err.to_string(),
            "no local manifest could be loaded from /app/project.manifest"
        );
    }

    #[test]
    fn test_from_storage_error() {
        let err: ManagerError = StorageError::InvalidRelativePath("../x".to_string()).into();
        assert!(matches!(err, ManagerError::Storage(_)));
        assert!(err.to_string().contains("../x"));
    }
}
