//! Progress arithmetic for single transfers and whole batches.

/// Floored percentage of `downloaded` out of `total`.
///
/// Returns `None` when the total is unknown (zero), since no meaningful
/// percentage can be reported.
pub fn transfer_percent(downloaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (downloaded.min(total) as u128 * 100) / total as u128;
    Some(percent as u8)
}

/// Percentage of a batch that has completed.
///
/// `total_units` is fixed when the batch launches and never recomputed.
/// An empty batch is complete.
pub fn batch_percent(total_units: usize, remaining_units: usize) -> u8 {
    if total_units == 0 {
        return 100;
    }
    let done = total_units.saturating_sub(remaining_units);
    ((done * 100) / total_units) as u8
}

/// Suppresses repeated reports of the same percentage for one transfer.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_percent: Option<u8>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new percentage if it differs from the last one reported.
    pub fn update(&mut self, downloaded: u64, total: u64) -> Option<u8> {
        let percent = transfer_percent(downloaded, total)?;
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_percent_floors() {
        assert_eq!(transfer_percent(0, 3), Some(0));
        assert_eq!(transfer_percent(1, 3), Some(33));
        assert_eq!(transfer_percent(2, 3), Some(66));
        assert_eq!(transfer_percent(3, 3), Some(100));
    }

    #[test]
    fn test_transfer_percent_unknown_total() {
        assert_eq!(transfer_percent(500, 0), None);
    }

    #[test]
    fn test_transfer_percent_clamps_overrun() {
        assert_eq!(transfer_percent(150, 100), Some(100));
    }

    #[test]
    fn test_batch_percent() {
        assert_eq!(batch_percent(3, 3), 0);
        assert_eq!(batch_percent(3, 2), 33);
        assert_eq!(batch_percent(3, 0), 100);
        assert_eq!(batch_percent(0, 0), 100);
    }

    #[test]
    fn test_tracker_reports_changes_only() {
        let mut tracker = ProgressTracker::new();

        assert_eq!(tracker.update(10, 1000), Some(1));
        assert_eq!(tracker.update(15, 1000), None);
        assert_eq!(tracker.update(20, 1000), Some(2));
        assert_eq!(tracker.update(20, 0), None);
    }
}
