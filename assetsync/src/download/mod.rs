//! Transport-agnostic file downloads.
//!
//! This module provides:
//! - The [`Transport`] capability with HTTP ([`ReqwestTransport`]) and
//!   in-memory ([`MemoryTransport`]) implementations
//! - Single and batch download execution ([`Downloader`])
//! - Stalled-transfer detection ([`StallPolicy`])
//! - Cancellation of abandoned launches ([`Cancellation`])
//! - Progress arithmetic for transfers and batches
//!
//! # Architecture
//!
//! ```text
//! Downloader
//!     │
//!     ├── Transport (trait)
//!     │       ├── ReqwestTransport
//!     │       └── MemoryTransport
//!     │
//!     ├── StallMonitor (aborts slow transfers)
//!     │
//!     └── DownloadEvent ──► channel ──► owning thread
//! ```

mod cancel;
mod downloader;
mod error;
mod http;
mod memory;
mod progress;
mod stall;
mod transport;
mod unit;

pub use cancel::Cancellation;
pub use downloader::{Downloader, ProgressCallback, DEFAULT_MAX_CONCURRENT};
pub use error::{DownloadError, ErrorCode};
pub use http::{ReqwestTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use memory::MemoryTransport;
pub use progress::{batch_percent, transfer_percent, ProgressTracker};
pub use stall::{StallMonitor, StallPolicy, Stalled};
pub use transport::{Transport, TransportBody};
pub use unit::{DownloadEvent, DownloadEventKind, DownloadUnit, LaunchId};
