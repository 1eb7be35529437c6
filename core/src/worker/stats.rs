//! Worker statistics tracking

use std::time::{Duration, Instant};

use serde::Serialize;

/// Statistics tracked by each worker
#[derive(Debug, Default, Clone, Serialize)]
pub struct WorkerStats {
    /// Items created under threshold
    pub created: u64,

    /// Items rewritten over threshold
    pub mutated: u64,

    /// Items skipped because the race bait failed on them
    pub misses: u64,

    /// Items closed and deleted
    pub released: u64,

    /// Releases that reported an error
    pub release_errors: u64,

    /// Completed passes through every binding
    pub cycles: u64,

    /// Worker start time
    #[serde(skip)]
    pub started_at: Option<Instant>,

    /// Worker end time
    #[serde(skip)]
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Get mutations per second
    pub fn mutations_per_second(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.mutated as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }

    /// Merge stats from another worker
    pub fn merge(&mut self, other: &WorkerStats) {
        self.created += other.created;
        self.mutated += other.mutated;
        self.misses += other.misses;
        self.released += other.released;
        self.release_errors += other.release_errors;
        self.cycles = self.cycles.max(other.cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_stats_defaults() {
        let stats = WorkerStats::default();
        assert_eq!(stats.created, 0);
        assert_eq!(stats.mutated, 0);
        assert_eq!(stats.misses, 0);
        assert!(stats.started_at.is_none());
        assert!(stats.ended_at.is_none());
        assert_eq!(stats.mutations_per_second(), 0.0);
    }

    #[test]
    fn test_worker_stats_merge() {
        let mut stats1 = WorkerStats {
            created: 10,
            mutated: 8,
            misses: 2,
            released: 10,
            cycles: 4,
            ..Default::default()
        };
        let stats2 = WorkerStats {
            created: 5,
            mutated: 5,
            release_errors: 1,
            cycles: 6,
            ..Default::default()
        };

        stats1.merge(&stats2);

        assert_eq!(stats1.created, 15);
        assert_eq!(stats1.mutated, 13);
        assert_eq!(stats1.misses, 2);
        assert_eq!(stats1.released, 10);
        assert_eq!(stats1.release_errors, 1);
        assert_eq!(stats1.cycles, 6);
    }

    #[test]
    fn test_worker_stats_start_stop() {
        let mut stats = WorkerStats::new();
        assert!(stats.elapsed().is_none());

        stats.start();
        assert!(stats.started_at.is_some());
        assert!(stats.elapsed().is_some());

        std::thread::sleep(Duration::from_millis(10));
        stats.stop();

        let elapsed = stats.elapsed().unwrap();
        assert!(elapsed >= Duration::from_millis(10));
    }
}
