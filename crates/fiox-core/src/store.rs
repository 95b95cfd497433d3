//! Latest-snapshot store shared between the metric sink and the collector.

use std::sync::{Mutex, PoisonError};

use fiox_common::MetricMap;

/// Holds the most recently decoded fio snapshot.
///
/// `update` merges and `snapshot` copies under a single lock acquisition
/// each, so a scrape never observes a half-applied update. A poisoned lock
/// still holds the last consistent merge, so both sides take it anyway.
/// The store is created in `main` and shared through `Arc`; there is no
/// global instance.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: Mutex<MetricMap>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a decoded snapshot into the latest view.
    ///
    /// Inserted keys overwrite; keys absent from `update` keep their
    /// previous values.
    pub fn update(&self, update: MetricMap) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.extend(update);
    }

    /// A consistent copy of the latest view.
    pub fn snapshot(&self) -> MetricMap {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
