//! In-memory transport.
//!
//! Serves fixed payloads keyed by URL and records every request, which makes
//! it useful for exercising the update flow without a network.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::DownloadError;
use super::transport::{Transport, TransportBody};

#[derive(Debug, Clone)]
enum MemoryResponse {
    Body(Vec<u8>),
    Fail(String),
    Broken(Vec<u8>),
}

/// Transport that answers from an in-memory table.
///
/// Unknown URLs fail with a network error, like a 404 would.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    responses: Mutex<HashMap<String, MemoryResponse>>,
    requests: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn set_body(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        lock(&self.responses).insert(url.into(), MemoryResponse::Body(body.into()));
    }

    /// Fail every request for `url` before any bytes arrive.
    pub fn set_failure(&self, url: impl Into<String>, message: impl Into<String>) {
        lock(&self.responses).insert(url.into(), MemoryResponse::Fail(message.into()));
    }

    /// Deliver `partial` for `url`, then break the connection.
    pub fn set_broken(&self, url: impl Into<String>, partial: impl Into<Vec<u8>>) {
        lock(&self.responses).insert(url.into(), MemoryResponse::Broken(partial.into()));
    }

    /// Forget any response configured for `url`.
    pub fn remove(&self, url: &str) {
        lock(&self.responses).remove(url);
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|u| *u == url).count()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<TransportBody, DownloadError> {
        lock(&self.requests).push(url.to_string());

        let response = lock(&self.responses).get(url).cloned();
        match response {
            Some(MemoryResponse::Body(body)) => {
                let len = body.len() as u64;
                Ok(TransportBody::new(Some(len), Cursor::new(body)))
            }
            Some(MemoryResponse::Fail(message)) => Err(DownloadError::network(message)),
            Some(MemoryResponse::Broken(partial)) => {
                // Declare more than we will deliver, like a dropped connection.
                let declared = partial.len() as u64 * 2 + 1;
                Ok(TransportBody::new(Some(declared), BrokenReader::new(partial)))
            }
            None => Err(DownloadError::network(format!("HTTP 404 from {}", url))),
        }
    }
}

/// Yields its bytes and then fails with a connection reset.
struct BrokenReader {
    data: Cursor<Vec<u8>>,
}

impl BrokenReader {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data: Cursor::new(data),
        }
    }
}

impl Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        Ok(n)
    }
}
