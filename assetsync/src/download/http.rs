//! HTTP transport backed by reqwest's blocking client.

use std::time::Duration;

use reqwest::blocking::Client;

use super::error::DownloadError;
use super::transport::{Transport, TransportBody};

/// Default connection timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on how long one read may block (5 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP(S) transport.
///
/// The read timeout bounds every blocking operation on the connection, so a
/// socket that stops delivering bytes surfaces as a network error instead of
/// hanging the worker. It is normally set to the stall window.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    read_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with default timeouts.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create a transport with custom connect and read timeouts.
    pub fn with_timeouts(
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| DownloadError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            read_timeout,
        })
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Transport for ReqwestTransport {
    fn open(&self, url: &str) -> Result<TransportBody, DownloadError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                DownloadError::network(format!(
                    "request to {} timed out after {}s",
                    url,
                    self.read_timeout.as_secs()
                ))
            } else {
                DownloadError::network(format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::network(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        Ok(TransportBody::new(response.content_length(), response))
    }
}
