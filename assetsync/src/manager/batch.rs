//! Bookkeeping for one update batch.
//!
//! The outstanding-unit map is the authoritative "work remaining" counter:
//! units leave it only on success. Failed units stay outstanding until a
//! manual retry downloads them.

use std::collections::{BTreeSet, HashMap};

use crate::download::{batch_percent, DownloadUnit, LaunchId};

/// Outcome of recording a unit success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub remaining: usize,
    pub percent: u8,
}

/// Outstanding units of a launched batch.
#[derive(Debug, Clone)]
pub struct Batch {
    launch: LaunchId,
    /// Total units, fixed when the batch is first launched.
    total: usize,
    outstanding: HashMap<String, DownloadUnit>,
    /// Units of the current launch that have not reported a terminal event.
    in_flight: BTreeSet<String>,
    failed: BTreeSet<String>,
}

impl Batch {
    /// Start tracking `units` under `launch`; all of them are in flight.
    pub fn new(launch: LaunchId, units: &[DownloadUnit]) -> Self {
        let outstanding: HashMap<String, DownloadUnit> = units
            .iter()
            .map(|unit| (unit.id.clone(), unit.clone()))
            .collect();
        Self {
            launch,
            total: outstanding.len(),
            in_flight: outstanding.keys().cloned().collect(),
            outstanding,
            failed: BTreeSet::new(),
        }
    }

    pub fn launch(&self) -> LaunchId {
        self.launch
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.outstanding.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Nothing is in flight, yet some units failed and are still outstanding.
    pub fn is_settled_with_failures(&self) -> bool {
        self.in_flight.is_empty() && !self.failed.is_empty()
    }

    /// Record a successful unit.
    ///
    /// Returns `None` if the unit was not in flight in this launch, so a
    /// duplicate or unknown completion never moves the counters.
    pub fn record_success(&mut self, unit_id: &str) -> Option<Settled> {
        if !self.in_flight.remove(unit_id) {
            return None;
        }
        self.outstanding.remove(unit_id);
        Some(Settled {
            remaining: self.remaining(),
            percent: batch_percent(self.total, self.remaining()),
        })
    }

    /// Record a failed unit.
    ///
    /// Returns `false` if the unit was not in flight in this launch.
    pub fn record_failure(&mut self, unit_id: &str) -> bool {
        if !self.in_flight.remove(unit_id) {
            return false;
        }
        self.failed.insert(unit_id.to_string())
    }

    /// Move every failed unit back in flight under a new launch.
    ///
    /// Returns the units to download. The total stays as launched.
    pub fn relaunch_failed(&mut self, launch: LaunchId) -> Vec<DownloadUnit> {
        let failed = std::mem::take(&mut self.failed);
        self.launch = launch;
        let units: Vec<DownloadUnit> = failed
            .iter()
            .filter_map(|id| self.outstanding.get(id).cloned())
            .collect();
        self.in_flight = units.iter().map(|unit| unit.id.clone()).collect();
        units
    }
}
