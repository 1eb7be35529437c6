//! The orchestration context shared by every role thread

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::arena::WorkItemArena;
use crate::barrier::{PhaseBarrier, Waiter};
use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::shutdown::ShutdownSignal;
use crate::stats::StatsAggregator;

/// Everything the role threads share, built once before any of them starts
///
/// Shared as `Arc<RunContext>` and dropped only after every thread has
/// joined.
#[derive(Debug)]
pub struct RunContext {
    config: HarnessConfig,
    barrier: PhaseBarrier,
    stats: StatsAggregator,
    arena: WorkItemArena,
    shutdown: Arc<ShutdownSignal>,
    started_at: Instant,
    started_wall: DateTime<Utc>,
}

impl RunContext {
    /// Build a context for `config` (clamped first)
    ///
    /// # Errors
    ///
    /// Returns an error if the work-item arena cannot be built.
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let config = config.clamped();
        let arena = WorkItemArena::new(config.items)?;
        Ok(Self {
            config,
            barrier: PhaseBarrier::new(),
            stats: StatsAggregator::new(),
            arena,
            shutdown: Arc::new(ShutdownSignal::new()),
            started_at: Instant::now(),
            started_wall: Utc::now(),
        })
    }

    /// Effective (clamped) configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The phase barrier
    pub fn barrier(&self) -> &PhaseBarrier {
        &self.barrier
    }

    /// Run-wide counters
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Work-item arena
    pub fn arena(&self) -> &WorkItemArena {
        &self.arena
    }

    /// Shared shutdown signal
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Owned handle to the shutdown signal (for listeners and timers)
    pub fn shutdown_handle(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Time since the context was built
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wall-clock start of the run
    pub fn started_wall(&self) -> DateTime<Utc> {
        self.started_wall
    }

    /// Waiter for worker threads
    pub fn worker_waiter(&self) -> Waiter<'_> {
        Waiter::new(&self.shutdown, self.config.worker_poll)
            .with_stall_timeout(self.config.stall_timeout)
    }

    /// Waiter for the orchestrator thread
    pub fn orchestrator_waiter(&self) -> Waiter<'_> {
        Waiter::new(&self.shutdown, self.config.orchestrator_poll)
            .with_stall_timeout(self.config.stall_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_clamps_config() {
        let ctx = RunContext::new(HarnessConfig::default().with_items(3).with_mutators(0)).unwrap();
        assert_eq!(ctx.config().items, 10);
        assert_eq!(ctx.config().mutators, 1);
        assert_eq!(ctx.arena().capacity(), 10);
    }

    #[test]
    fn test_shutdown_handle_is_shared() {
        let ctx = RunContext::new(HarnessConfig::default()).unwrap();
        let handle = ctx.shutdown_handle();
        handle.request(crate::shutdown::StopReason::UserRequest);
        assert!(ctx.shutdown().is_requested());
        assert!(ctx.worker_waiter().shutdown_requested());
    }
}
