//! Result aggregation from multiple workers

use std::time::Duration;

use serde::Serialize;

use crate::orchestrator::OrchestratorStats;
use crate::shutdown::StopReason;
use crate::stats::StatsSnapshot;
use crate::worker::WorkerStats;

/// Aggregated statistics from all workers
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedStats {
    /// Number of workers that returned stats
    pub total_workers: usize,

    /// Items created under threshold
    pub total_created: u64,

    /// Items rewritten over threshold
    pub total_mutated: u64,

    /// Items closed and deleted during cleanup
    pub total_released: u64,

    /// Items skipped after a bait failure
    pub total_misses: u64,

    /// Releases that reported an error
    pub total_release_errors: u64,

    /// Maximum duration across all workers
    pub total_duration: Duration,

    /// Overall mutations per second
    pub mutations_per_second: f64,
}

/// Aggregate statistics from multiple workers
pub fn aggregate_worker_stats(stats: &[WorkerStats]) -> AggregatedStats {
    if stats.is_empty() {
        return AggregatedStats::default();
    }

    let mut merged = WorkerStats::new();
    for s in stats {
        merged.merge(s);
    }

    // Use the maximum elapsed time across all workers
    let total_duration = stats
        .iter()
        .filter_map(|s| s.elapsed())
        .max()
        .unwrap_or(Duration::ZERO);

    let secs = total_duration.as_secs_f64();
    let mutations_per_second = if secs > 0.0 {
        merged.mutated as f64 / secs
    } else {
        0.0
    };

    AggregatedStats {
        total_workers: stats.len(),
        total_created: merged.created,
        total_mutated: merged.mutated,
        total_released: merged.released,
        total_misses: merged.misses,
        total_release_errors: merged.release_errors,
        total_duration,
        mutations_per_second,
    }
}

/// What happened to the persisted run record at exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordDisposition {
    /// The record was deleted
    Removed,
    /// There was no record to delete
    Absent,
    /// Deleting the record failed; it will be read as a clean stop next time
    Failed(String),
}

impl std::fmt::Display for RecordDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordDisposition::Removed => f.write_str("removed"),
            RecordDisposition::Absent => f.write_str("absent"),
            RecordDisposition::Failed(e) => write!(f, "left behind ({})", e),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Wall-clock duration of the run
    pub runtime: Duration,

    /// Run-wide counters at exit
    pub totals: StatsSnapshot,

    /// Mutations per second over the run
    pub ops_per_sec: f64,

    /// Why the run stopped
    pub stop_reason: Option<StopReason>,

    /// Per-role worker totals
    pub workers: AggregatedStats,

    /// Orchestrator totals, if it returned
    pub orchestrator: Option<OrchestratorStats>,

    /// Threads that failed (stalled, errored or panicked)
    pub thread_failures: usize,

    /// Items still live after every thread joined, released by the sweep
    pub swept: u64,

    /// Fate of the persisted record
    pub record: RecordDisposition,
}

impl RunSummary {
    /// Whether the run ended on a barrier stall
    pub fn stalled(&self) -> bool {
        matches!(self.stop_reason, Some(StopReason::Stall(_)))
    }
}
