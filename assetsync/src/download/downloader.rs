//! Single and batch download execution.
//!
//! The [`Downloader`] streams one unit at a time to its destination file and
//! can run units on worker threads, reporting progress and outcomes over a
//! channel so that the thread owning the update state never shares it with
//! the workers.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};
use url::Url;

use super::cancel::Cancellation;
use super::error::DownloadError;
use super::progress::ProgressTracker;
use super::stall::{StallMonitor, StallPolicy};
use super::transport::Transport;
use super::unit::{DownloadEvent, DownloadEventKind, DownloadUnit, LaunchId};
use crate::storage::StorageRoot;

/// Buffer size for streaming bodies to disk (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Default number of transfers a batch runs at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Progress callback for a single transfer.
///
/// # Arguments
///
/// * `downloaded` - Bytes written so far
/// * `total` - Declared body size, or 0 if unknown
pub type ProgressCallback<'a> = &'a mut dyn FnMut(u64, u64);

/// Transport-agnostic download executor.
///
/// Cloning is cheap; clones share the same transport.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    storage: StorageRoot,
    stall_policy: StallPolicy,
    max_concurrent: usize,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("storage", &self.storage)
            .field("stall_policy", &self.stall_policy)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Create a downloader that writes only under `storage`.
    pub fn new(transport: Arc<dyn Transport>, storage: StorageRoot) -> Self {
        Self {
            transport,
            storage,
            stall_policy: StallPolicy::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    /// Set how many units a batch transfers at once (minimum 1).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stall_policy(&self) -> StallPolicy {
        self.stall_policy
    }

    /// Download one unit on the calling thread.
    ///
    /// The body is streamed into a partial file next to the destination,
    /// created (or truncated) before the transfer starts. Only a complete
    /// transfer of a launch that is still live is moved onto the
    /// destination; otherwise the partial file is removed and the
    /// destination is left as it was.
    ///
    /// Returns the number of bytes written.
    pub fn fetch(
        &self,
        launch: LaunchId,
        unit: &DownloadUnit,
        cancel: &Cancellation,
        on_progress: ProgressCallback<'_>,
    ) -> Result<u64, DownloadError> {
        validate_url(&unit.source_url)?;

        let partial = partial_path(&unit.destination, launch)
            .filter(|_| self.storage.contains(&unit.destination))
            .ok_or_else(|| {
                DownloadError::invalid_storage_path(format!(
                    "{} is not under {}",
                    unit.destination.display(),
                    self.storage.path().display()
                ))
            })?;

        let file = cancel
            .guard(|| self.create_partial(unit, &partial))
            .unwrap_or_else(|| Err(cancelled(unit)))?;

        let result = self
            .stream(unit, file, cancel, on_progress)
            .and_then(|bytes| self.commit(unit, &partial, cancel).map(|()| bytes));

        if result.is_err() {
            if let Err(e) = self.storage.remove_file(&partial) {
                warn!(
                    path = %partial.display(),
                    error = %e,
                    "failed to remove partial download"
                );
            }
        }
        result
    }

    fn create_partial(&self, unit: &DownloadUnit, partial: &Path) -> Result<File, DownloadError> {
        self.storage
            .create_parent_dirs(&unit.destination)
            .map_err(|e| DownloadError::create_file(e.to_string()))?;

        File::create(partial).map_err(|e| {
            DownloadError::create_file(format!(
                "failed to create {}: {}",
                partial.display(),
                e
            ))
        })
    }

    fn commit(
        &self,
        unit: &DownloadUnit,
        partial: &Path,
        cancel: &Cancellation,
    ) -> Result<(), DownloadError> {
        match cancel.guard(|| self.storage.rename(partial, &unit.destination)) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(DownloadError::create_file(format!(
                "failed to move {} into place: {}",
                unit.destination.display(),
                e
            ))),
            None => Err(cancelled(unit)),
        }
    }

    fn stream(
        &self,
        unit: &DownloadUnit,
        file: File,
        cancel: &Cancellation,
        on_progress: ProgressCallback<'_>,
    ) -> Result<u64, DownloadError> {
        let mut body = self.transport.open(&unit.source_url)?;
        let total = body.content_length.unwrap_or(0);

        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;
        let mut monitor = StallMonitor::new(self.stall_policy, Instant::now());

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(unit));
            }

            let bytes_read = match body.reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DownloadError::network(format!(
                        "read error from {}: {}",
                        unit.source_url, e
                    )))
                }
            };

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| write_error(unit, e))?;

            downloaded += bytes_read as u64;
            on_progress(downloaded, total);

            monitor
                .record(bytes_read as u64, Instant::now())
                .map_err(|stalled| {
                    DownloadError::network(format!("{} from {}", stalled, unit.source_url))
                })?;
        }

        writer.flush().map_err(|e| write_error(unit, e))?;

        if total > 0 && downloaded < total {
            return Err(DownloadError::network(format!(
                "connection to {} closed after {} of {} bytes",
                unit.source_url, downloaded, total
            )));
        }

        Ok(downloaded)
    }

    /// Download one unit on a new thread, reporting over `events`.
    pub fn download_async(
        &self,
        launch: LaunchId,
        unit: DownloadUnit,
        cancel: Cancellation,
        events: UnboundedSender<DownloadEvent>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        thread::spawn(move || this.run_unit(launch, &unit, &cancel, &events))
    }

    /// Download every unit of a batch without blocking the caller.
    ///
    /// One coordinator thread is spawned per batch; it fans the units out to
    /// at most `max_concurrent` workers. Each unit produces its own events
    /// and fails independently of the others. Units not yet started when
    /// `cancel` fires still report, but never touch their destinations.
    pub fn batch_download(
        &self,
        launch: LaunchId,
        units: Vec<DownloadUnit>,
        cancel: Cancellation,
        events: UnboundedSender<DownloadEvent>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        thread::spawn(move || {
            let workers = this.max_concurrent.min(units.len()).max(1);
            debug!(%launch, units = units.len(), workers, "batch started");

            let queue = Mutex::new(VecDeque::from(units));
            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(|| loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .pop_front();
                        let Some(unit) = next else { break };
                        this.run_unit(launch, &unit, &cancel, &events);
                    });
                }
            });

            debug!(%launch, "batch workers finished");
        })
    }

    fn run_unit(
        &self,
        launch: LaunchId,
        unit: &DownloadUnit,
        cancel: &Cancellation,
        events: &UnboundedSender<DownloadEvent>,
    ) {
        let mut tracker = ProgressTracker::new();
        let result = self.fetch(launch, unit, cancel, &mut |downloaded, total| {
            if let Some(percent) = tracker.update(downloaded, total) {
                send(
                    events,
                    DownloadEvent {
                        launch,
                        unit_id: unit.id.clone(),
                        kind: DownloadEventKind::Progress {
                            total,
                            downloaded,
                            percent,
                        },
                    },
                );
            }
        });

        let kind = match result {
            Ok(bytes) => DownloadEventKind::Succeeded { bytes },
            Err(err) if cancel.is_cancelled() => {
                debug!(%launch, id = %unit.id, "download cancelled");
                DownloadEventKind::Failed(err)
            }
            Err(err) => {
                warn!(%launch, id = %unit.id, url = %unit.source_url, error = %err, "download failed");
                DownloadEventKind::Failed(err)
            }
        };

        send(
            events,
            DownloadEvent {
                launch,
                unit_id: unit.id.clone(),
                kind,
            },
        );
    }
}

fn send(events: &UnboundedSender<DownloadEvent>, event: DownloadEvent) {
    if events.send(event).is_err() {
        trace!("event receiver dropped, discarding download event");
    }
}

/// Partial file one launch streams `destination` into.
fn partial_path(destination: &Path, launch: LaunchId) -> Option<PathBuf> {
    let mut name = destination.file_name()?.to_os_string();
    name.push(format!(".{}.part", launch.0));
    Some(destination.with_file_name(name))
}

fn cancelled(unit: &DownloadUnit) -> DownloadError {
    DownloadError::network(format!("transfer of {} cancelled", unit.id))
}

fn validate_url(source_url: &str) -> Result<(), DownloadError> {
    if source_url.trim().is_empty() {
        return Err(DownloadError::invalid_url("empty source url"));
    }
    Url::parse(source_url)
        .map(|_| ())
        .map_err(|e| DownloadError::invalid_url(format!("{}: {}", source_url, e)))
}

fn write_error(unit: &DownloadUnit, e: io::Error) -> DownloadError {
    DownloadError::create_file(format!(
        "failed to write {}: {}",
        unit.destination.display(),
        e
    ))
}
