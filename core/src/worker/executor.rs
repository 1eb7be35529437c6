//! Worker execution loop

use std::sync::Arc;

use crate::arena::ItemHandle;
use crate::barrier::{ArriveOutcome, StallInfo, WaitOutcome, Waiter};
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::shutdown::{PanicGuard, StopReason};
use crate::traits::RaceBait;

use super::affinity::pin_to_cpu;
use super::role::{Action, Binding, WorkerRecord, WorkerState};
use super::stats::WorkerStats;

/// How a pass through the worker's bindings ended
enum Step {
    Continue,
    Shutdown,
    Stalled(StallInfo),
}

/// Per-pass counters, flushed to the shared aggregator before arriving
#[derive(Debug, Default)]
struct PassCounts {
    done: u64,
    misses: u64,
    interrupted: bool,
}

/// Worker runs its phase bindings in a loop: wait -> act -> arrive -> repeat
///
/// Workers are plain OS threads managed by the Harness. They share the race
/// bait and the run context via Arc; the barrier's phase transitions are
/// their only synchronization.
pub struct Worker {
    /// Shared identity and live state
    record: Arc<WorkerRecord>,

    /// Phases this worker acts in, in cycle order
    bindings: Vec<Binding>,

    /// Run context (shared across all threads via Arc)
    ctx: Arc<RunContext>,

    /// Race bait (shared across all threads via Arc)
    bait: Arc<dyn RaceBait>,
}

impl Worker {
    /// Create a new worker
    pub fn new(
        record: Arc<WorkerRecord>,
        bindings: Vec<Binding>,
        ctx: Arc<RunContext>,
        bait: Arc<dyn RaceBait>,
    ) -> Self {
        Self {
            record,
            bindings,
            ctx,
            bait,
        }
    }

    /// Shared record of this worker
    pub fn record(&self) -> Arc<WorkerRecord> {
        Arc::clone(&self.record)
    }

    /// Run the worker loop
    ///
    /// Returns WorkerStats when shutdown is observed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BarrierStall`] if a wait exceeds the stall
    /// timeout; shutdown has been requested by then.
    pub fn run(self) -> HarnessResult<WorkerStats> {
        let name = self.record.thread_name();
        let _guard = PanicGuard::new(self.ctx.shutdown(), &name);
        let mut stats = WorkerStats::new();
        stats.start();

        if self.ctx.config().pin_threads {
            if let Some(hint) = self.record.cpu_hint {
                pin_to_cpu(hint);
            }
        }
        self.record.set_alive(true);

        tracing::debug!(
            worker = %name,
            items = self.record.partition.len(),
            start = self.record.partition.start,
            "Worker started"
        );

        let waiter = self.ctx.worker_waiter();
        let outcome = loop {
            match self.cycle(&waiter, &mut stats) {
                Step::Continue => stats.cycles += 1,
                Step::Shutdown => break Ok(()),
                Step::Stalled(info) => break Err(info),
            }
        };

        self.record.set_state(WorkerState::Stopped);
        self.record.set_alive(false);
        stats.stop();

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    worker = %name,
                    created = stats.created,
                    mutated = stats.mutated,
                    released = stats.released,
                    misses = stats.misses,
                    cycles = stats.cycles,
                    elapsed_ms = ?stats.elapsed().map(|d| d.as_millis()),
                    "Worker finished"
                );
                Ok(stats)
            }
            Err(info) => {
                tracing::error!(worker = %name, stall = %info, "Barrier stall");
                self.ctx
                    .shutdown()
                    .request(StopReason::Stall(format!("{}: {}", name, info)));
                Err(HarnessError::BarrierStall(info))
            }
        }
    }

    /// One pass through every binding
    fn cycle(&self, waiter: &Waiter<'_>, stats: &mut WorkerStats) -> Step {
        let barrier = self.ctx.barrier();

        for binding in &self.bindings {
            self.record.set_state(WorkerState::WaitForPhase);
            match barrier.wait_for(binding.phase, waiter) {
                WaitOutcome::Ready(_) => {}
                WaitOutcome::Shutdown => return Step::Shutdown,
                WaitOutcome::Stalled(info) => return Step::Stalled(info),
            }

            self.record.set_state(WorkerState::Act);
            let pass = self.act(binding.action, stats);
            if pass.interrupted {
                return Step::Shutdown;
            }

            self.record.set_state(WorkerState::Arrive);
            let step = match binding.quorum {
                Some(quorum) => match barrier.arrive(quorum, waiter) {
                    ArriveOutcome::Advanced(next) => {
                        tracing::trace!(
                            worker = %self.record.thread_name(),
                            phase = %next,
                            "Quorum complete"
                        );
                        Step::Continue
                    }
                    ArriveOutcome::Released(_) => Step::Continue,
                    ArriveOutcome::Shutdown => Step::Shutdown,
                    ArriveOutcome::Stalled(info) => Step::Stalled(info),
                },
                None => match barrier.wait_while(binding.phase, waiter) {
                    WaitOutcome::Ready(_) => Step::Continue,
                    WaitOutcome::Shutdown => Step::Shutdown,
                    WaitOutcome::Stalled(info) => Step::Stalled(info),
                },
            };
            if !matches!(step, Step::Continue) {
                return step;
            }
        }
        Step::Continue
    }

    /// Apply `action` to every item of the partition
    ///
    /// Counts are flushed to the shared aggregator exactly, before the
    /// caller arrives, even when the pass is cut short by shutdown.
    fn act(&self, action: Action, stats: &mut WorkerStats) -> PassCounts {
        let mut pass = PassCounts::default();

        for item in self.ctx.arena().handles(self.record.partition) {
            if self.ctx.shutdown().is_requested() {
                pass.interrupted = true;
                break;
            }
            match action {
                Action::Create => self.create(item, &mut pass),
                Action::Mutate => self.mutate(item, &mut pass),
                Action::Release => self.release(item, &mut pass, stats),
            }
        }

        let aggregate = self.ctx.stats();
        match action {
            Action::Create => stats.created += pass.done,
            Action::Mutate => {
                stats.mutated += pass.done;
                aggregate.record_operations(pass.done);
            }
            Action::Release => stats.released += pass.done,
        }
        if pass.misses > 0 {
            stats.misses += pass.misses;
            aggregate.record_misses(pass.misses);
            tracing::warn!(
                worker = %self.record.thread_name(),
                action = ?action,
                misses = pass.misses,
                "Race bait failed on some items this pass"
            );
        }
        pass
    }

    fn create(&self, item: ItemHandle, pass: &mut PassCounts) {
        match self.bait.create(item) {
            Ok(token) => {
                if let Some(previous) = self.ctx.arena().install(item, token) {
                    tracing::warn!(%item, previous, "Replaced a token that was never released");
                }
                pass.done += 1;
            }
            Err(e) => {
                pass.misses += 1;
                tracing::debug!(%item, error = %e, "Create failed");
            }
        }
    }

    fn mutate(&self, item: ItemHandle, pass: &mut PassCounts) {
        let arena = self.ctx.arena();
        let Some(token) = arena.token(item) else {
            return;
        };
        match self.bait.mutate(item, token) {
            Ok(()) => {
                arena.mark_mutated(item);
                pass.done += 1;
            }
            Err(e) => {
                pass.misses += 1;
                tracing::debug!(%item, error = %e, "Mutate failed");
            }
        }
    }

    fn release(&self, item: ItemHandle, pass: &mut PassCounts, stats: &mut WorkerStats) {
        let token = self.ctx.arena().take(item);
        match self.bait.release(item, token) {
            Ok(()) => {
                if token.is_some() {
                    pass.done += 1;
                }
            }
            Err(e) => {
                stats.release_errors += 1;
                tracing::debug!(%item, error = %e, "Release failed");
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.record.id)
            .field("role", &self.record.role)
            .field("partition", &self.record.partition)
            .field("bait", &self.bait.name())
            .field("bindings", &self.bindings)
            .finish()
    }
}
