//! Cancellation of abandoned launches.

use std::sync::{Arc, PoisonError, RwLock};

/// Cancellation flag shared by every transfer of one launch.
///
/// Filesystem changes a transfer makes outside its own partial file run
/// under [`Cancellation::guard`]. Once [`Cancellation::cancel`] has returned,
/// no guarded change of that launch is running and none will start.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<RwLock<bool>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the launch, waiting for any guarded change in progress.
    pub fn cancel(&self) {
        *self
            .cancelled
            .write()
            .unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` unless the launch is cancelled.
    ///
    /// Returns `None` without running `f` once cancelled.
    pub fn guard<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let cancelled = self.cancelled.read().unwrap_or_else(PoisonError::into_inner);
        if *cancelled {
            None
        } else {
            Some(f())
        }
    }
}
