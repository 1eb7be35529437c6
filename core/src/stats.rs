//! Run-wide monotonic counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lock-free counters shared by every role thread
///
/// Counters only ever grow: there is no decrement and no reset.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    operations: AtomicU64,
    bursts: AtomicU64,
    triggers: AtomicU64,
    misses: AtomicU64,
}

impl StatsAggregator {
    /// New aggregator with every counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add completed mutations
    pub fn record_operations(&self, count: u64) {
        if count > 0 {
            self.operations.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Count one completed burst, returning the new total
    pub fn record_burst(&self) -> u64 {
        self.bursts.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add issued external-trigger calls
    pub fn record_triggers(&self, count: u64) {
        if count > 0 {
            self.triggers.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Add items skipped because the bait failed on them
    pub fn record_misses(&self, count: u64) {
        if count > 0 {
            self.misses.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Completed mutations so far
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    /// Completed bursts so far
    pub fn bursts(&self) -> u64 {
        self.bursts.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            bursts: self.bursts.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the aggregator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Completed mutations
    pub operations: u64,
    /// Completed bursts
    pub bursts: u64,
    /// Issued external-trigger calls
    pub triggers: u64,
    /// Items skipped after a bait failure
    pub misses: u64,
}

impl StatsSnapshot {
    /// Mutations per second over `elapsed`
    pub fn operations_per_second(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.operations as f64 / secs
        } else {
            0.0
        }
    }
}
