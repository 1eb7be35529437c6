//! Burst-level throughput samples and orchestrator statistics

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::stats::StatsSnapshot;

/// Point-in-time throughput, emitted every `report_every` bursts
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputSample {
    /// Time since the run started
    pub elapsed: Duration,
    /// Bursts completed
    pub bursts: u64,
    /// Mutations completed
    pub operations: u64,
    /// Trigger calls issued
    pub triggers: u64,
    /// Items skipped after a bait failure
    pub misses: u64,
    /// Mutations per second over the whole run
    pub ops_per_sec: f64,
}

impl ThroughputSample {
    /// Sample from aggregator counters at `elapsed`
    pub fn new(elapsed: Duration, snapshot: StatsSnapshot) -> Self {
        Self {
            elapsed,
            bursts: snapshot.bursts,
            operations: snapshot.operations,
            triggers: snapshot.triggers,
            misses: snapshot.misses,
            ops_per_sec: snapshot.operations_per_second(elapsed),
        }
    }
}

/// Statistics tracked by the orchestrator thread
#[derive(Debug, Default, Clone, Serialize)]
pub struct OrchestratorStats {
    /// Bursts driven to completion
    pub bursts: u64,

    /// Trigger calls issued
    pub triggers: u64,

    /// Trigger calls that failed
    pub trigger_failures: u64,

    /// Samples delivered to the channel
    pub samples_sent: u64,

    /// Samples dropped because the channel was full or closed
    pub samples_dropped: u64,

    /// Orchestrator start time
    #[serde(skip)]
    pub started_at: Option<Instant>,

    /// Orchestrator end time
    #[serde(skip)]
    pub ended_at: Option<Instant>,
}

impl OrchestratorStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Bursts per second
    pub fn bursts_per_second(&self) -> f64 {
        match self.elapsed() {
            Some(d) if d.as_secs_f64() > 0.0 => self.bursts as f64 / d.as_secs_f64(),
            _ => 0.0,
        }
    }
}
