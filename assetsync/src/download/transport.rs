//! Transport capability used by the downloader.

use std::fmt;
use std::io::Read;

use super::error::DownloadError;

/// An opened response body.
pub struct TransportBody {
    /// Declared body length, if the transport knows it.
    pub content_length: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

impl TransportBody {
    pub fn new(content_length: Option<u64>, reader: impl Read + Send + 'static) -> Self {
        Self {
            content_length,
            reader: Box::new(reader),
        }
    }
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Fetches the body behind a URL.
///
/// This abstraction keeps the downloader independent of the HTTP stack and
/// lets tests substitute an in-memory transport. Implementations should fail
/// with [`ErrorCode::Network`](super::ErrorCode::Network) for anything that
/// is not a local problem, and should bound how long a single read may block.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> Result<TransportBody, DownloadError>;
}
