//! Low-speed ("stalled") transfer detection.
//!
//! A transfer is stalled when its throughput, measured over a full window,
//! falls below a minimum rate. Stalled transfers are aborted and reported as
//! network errors; they are never retried here.

use std::time::{Duration, Instant};

/// Default minimum sustained rate in bytes per second.
pub const DEFAULT_MIN_BYTES_PER_SEC: u64 = 1;

/// Default measurement window.
pub const DEFAULT_STALL_WINDOW: Duration = Duration::from_secs(5);

/// Minimum throughput a transfer must sustain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallPolicy {
    /// Required bytes per second, averaged over `window`. Zero disables the check.
    pub min_bytes_per_sec: u64,
    pub window: Duration,
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            min_bytes_per_sec: DEFAULT_MIN_BYTES_PER_SEC,
            window: DEFAULT_STALL_WINDOW,
        }
    }
}

impl StallPolicy {
    pub fn new(min_bytes_per_sec: u64, window: Duration) -> Self {
        Self {
            min_bytes_per_sec,
            window,
        }
    }

    /// A policy that never reports a stall.
    pub fn disabled() -> Self {
        Self::new(0, DEFAULT_STALL_WINDOW)
    }

    pub fn is_enabled(&self) -> bool {
        self.min_bytes_per_sec > 0 && !self.window.is_zero()
    }
}

/// Throughput observed in a window that fell short of the policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stalled {
    pub observed_bytes_per_sec: f64,
    pub window: Duration,
}

impl std::fmt::Display for Stalled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transfer stalled: {:.1} B/s over {}s",
            self.observed_bytes_per_sec,
            self.window.as_secs()
        )
    }
}

/// Tracks throughput of one transfer against a [`StallPolicy`].
#[derive(Debug)]
pub struct StallMonitor {
    policy: StallPolicy,
    window_start: Instant,
    window_bytes: u64,
}

impl StallMonitor {
    pub fn new(policy: StallPolicy, now: Instant) -> Self {
        Self {
            policy,
            window_start: now,
            window_bytes: 0,
        }
    }

    /// Record `bytes` received at `now`.
    ///
    /// Once a full window has elapsed the average rate is checked and the
    /// window restarts.
    pub fn record(&mut self, bytes: u64, now: Instant) -> Result<(), Stalled> {
        if !self.policy.is_enabled() {
            return Ok(());
        }

        self.window_bytes += bytes;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.policy.window {
            return Ok(());
        }

        let rate = self.window_bytes as f64 / elapsed.as_secs_f64();
        if rate < self.policy.min_bytes_per_sec as f64 {
            return Err(Stalled {
                observed_bytes_per_sec: rate,
                window: elapsed,
            });
        }

        self.window_start = now;
        self.window_bytes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = StallPolicy::default();
        assert_eq!(policy.min_bytes_per_sec, 1);
        assert_eq!(policy.window, Duration::from_secs(5));
        assert!(policy.is_enabled());
        assert!(!StallPolicy::disabled().is_enabled());
    }

    #[test]
    fn test_fast_transfer_never_stalls() {
        let start = Instant::now();
        let mut monitor = StallMonitor::new(StallPolicy::new(100, Duration::from_secs(1)), start);

        for i in 1..=10 {
            let now = start + Duration::from_millis(500 * i);
            assert!(monitor.record(200, now).is_ok());
        }
    }

    #[test]
    fn test_slow_window_is_stalled() {
        let start = Instant::now();
        let mut monitor = StallMonitor::new(StallPolicy::new(100, Duration::from_secs(1)), start);

        assert!(monitor.record(10, start + Duration::from_millis(400)).is_ok());
        let stalled = monitor
            .record(10, start + Duration::from_millis(1000))
            .unwrap_err();

        assert!(stalled.observed_bytes_per_sec < 100.0);
        assert!(stalled.to_string().contains("stalled"));
    }

    #[test]
    fn test_window_resets_after_check() {
        let start = Instant::now();
        let mut monitor = StallMonitor::new(StallPolicy::new(100, Duration::from_secs(1)), start);

        // Burst in the first window carries it.
        assert!(monitor.record(1000, start + Duration::from_secs(1)).is_ok());
        // The second window is judged on its own bytes.
        assert!(monitor.record(10, start + Duration::from_secs(2)).is_err());
    }

    #[test]
    fn test_disabled_policy_ignores_rate() {
        let start = Instant::now();
        let mut monitor = StallMonitor::new(StallPolicy::disabled(), start);
        assert!(monitor.record(0, start + Duration::from_secs(60)).is_ok());
    }
}
