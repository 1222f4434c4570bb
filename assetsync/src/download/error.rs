//! Error types for single-unit transfers.

use std::fmt;

use thiserror::Error;

/// Classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Network unavailable, HTTP failure, read failure or a stalled transfer.
    Network,
    /// The destination file could not be created or written.
    CreateFile,
    /// The source URL is empty or malformed.
    InvalidUrl,
    /// The destination lies outside the storage root.
    InvalidStoragePath,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network error",
            Self::CreateFile => "create file error",
            Self::InvalidUrl => "invalid url",
            Self::InvalidStoragePath => "invalid storage path",
        };
        f.write_str(name)
    }
}

/// A transfer failure reported for one download unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct DownloadError {
    pub code: ErrorCode,
    pub message: String,
}

impl DownloadError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Network, message)
    }

    pub fn create_file(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CreateFile, message)
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUrl, message)
    }

    pub fn invalid_storage_path(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStoragePath, message)
    }
}
