//! Download units and the completion events delivered for them.

use std::fmt;
use std::path::PathBuf;

use super::error::DownloadError;

/// One scheduled file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadUnit {
    /// Caller-chosen identifier, echoed back in every event for this unit.
    pub id: String,
    pub source_url: String,
    pub destination: PathBuf,
}

impl DownloadUnit {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            destination: destination.into(),
        }
    }
}

/// Tag identifying one launch of a fetch or batch.
///
/// Every event carries the launch it belongs to so that a consumer can drop
/// events from launches it has since abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaunchId(pub u64);

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "launch#{}", self.0)
    }
}

/// Outcome or progress report for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEventKind {
    /// Byte progress, sent only when the floored percentage changes.
    Progress {
        total: u64,
        downloaded: u64,
        percent: u8,
    },
    /// The unit's file is complete at its destination.
    Succeeded { bytes: u64 },
    /// The unit failed; its partial file has been removed and the
    /// destination left untouched.
    Failed(DownloadError),
}

/// Message sent from download workers to the owning thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEvent {
    pub launch: LaunchId,
    pub unit_id: String,
    pub kind: DownloadEventKind,
}

impl DownloadEvent {
    /// Whether this is the last event that will be sent for its unit.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, DownloadEventKind::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        let progress = DownloadEvent {
            launch: LaunchId(1),
            unit_id: "a".to_string(),
            kind: DownloadEventKind::Progress {
                total: 10,
                downloaded: 5,
                percent: 50,
            },
        };
        let done = DownloadEvent {
            kind: DownloadEventKind::Succeeded { bytes: 10 },
            ..progress.clone()
        };

        assert!(!progress.is_terminal());
        assert!(done.is_terminal());
    }

    #[test]
    fn test_launch_id_display() {
        assert_eq!(LaunchId(7).to_string(), "launch#7");
    }
}
