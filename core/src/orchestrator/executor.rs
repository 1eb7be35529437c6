//! Orchestrator execution logic

use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Instant;

use crate::barrier::{Phase, StallInfo, WaitOutcome};
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::shutdown::{PanicGuard, StopReason};
use crate::traits::RaceBait;
use crate::worker::pin_to_cpu;

use super::sample::{OrchestratorStats, ThroughputSample};

const THREAD_NAME: &str = "orchestrator";

/// Orchestrator drives the externally triggered phase of every burst
///
/// Once the accumulators have published `Trigger` it asks the race bait to
/// start acting on every live item, opens the race window, and waits for the
/// mutators to close it.
pub struct Orchestrator {
    /// Run context (shared across all threads)
    ctx: Arc<RunContext>,

    /// Race bait (shared across all threads)
    bait: Arc<dyn RaceBait>,

    /// Throughput sample sender
    samples: SyncSender<ThroughputSample>,

    /// Processor to pin to
    cpu_hint: Option<usize>,
}

impl Orchestrator {
    /// Create a new orchestrator pinned to processor 0
    pub fn new(
        ctx: Arc<RunContext>,
        bait: Arc<dyn RaceBait>,
        samples: SyncSender<ThroughputSample>,
    ) -> Self {
        Self {
            ctx,
            bait,
            samples,
            cpu_hint: Some(0),
        }
    }

    /// Set the processor to pin to
    pub fn with_cpu_hint(mut self, hint: Option<usize>) -> Self {
        self.cpu_hint = hint;
        self
    }

    /// Run the burst loop until shutdown
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BarrierStall`] if a wait exceeds the stall
    /// timeout; shutdown has been requested by then.
    pub fn run(self) -> HarnessResult<OrchestratorStats> {
        let _guard = PanicGuard::new(self.ctx.shutdown(), THREAD_NAME);
        let mut stats = OrchestratorStats::new();
        stats.started_at = Some(Instant::now());

        if self.ctx.config().pin_threads {
            if let Some(hint) = self.cpu_hint {
                pin_to_cpu(hint);
            }
        }

        let barrier = self.ctx.barrier();
        let waiter = self.ctx.orchestrator_waiter();
        let report_every = self.ctx.config().report_every.max(1);

        tracing::debug!(report_every, "Orchestrator started");

        let outcome = loop {
            match barrier.wait_for(Phase::Trigger, &waiter) {
                WaitOutcome::Ready(_) => {}
                WaitOutcome::Shutdown => break Ok(()),
                WaitOutcome::Stalled(info) => break Err(info),
            }

            self.fire_triggers(&mut stats);
            barrier.advance_phase(Phase::Race);

            match barrier.wait_while(Phase::Race, &waiter) {
                WaitOutcome::Ready(_) => {}
                WaitOutcome::Shutdown => break Ok(()),
                WaitOutcome::Stalled(info) => break Err(info),
            }

            stats.bursts += 1;
            let bursts = self.ctx.stats().record_burst();
            if bursts % report_every == 0 {
                self.report(&mut stats);
            }
        };

        stats.ended_at = Some(Instant::now());
        self.finish(outcome, stats)
    }

    /// Fire the trigger at every live item, without waiting for the target
    fn fire_triggers(&self, stats: &mut OrchestratorStats) {
        let mut issued = 0u64;
        let mut failed = 0u64;

        for (item, token) in self.ctx.arena().live() {
            if self.ctx.shutdown().is_requested() {
                break;
            }
            issued += 1;
            if let Err(e) = self.bait.trigger(item, token) {
                failed += 1;
                tracing::debug!(%item, error = %e, "Trigger failed");
            }
        }

        let aggregate = self.ctx.stats();
        aggregate.record_triggers(issued);
        aggregate.record_misses(failed);
        stats.triggers += issued;
        stats.trigger_failures += failed;

        if failed > 0 {
            tracing::warn!(issued, failed, "Some triggers failed this burst");
        }
    }

    /// Log a throughput sample and offer it to the channel without blocking
    fn report(&self, stats: &mut OrchestratorStats) {
        let sample = ThroughputSample::new(self.ctx.elapsed(), self.ctx.stats().snapshot());
        tracing::info!(
            elapsed_secs = sample.elapsed.as_secs(),
            bursts = sample.bursts,
            operations = sample.operations,
            rate = sample.ops_per_sec,
            "Progress"
        );

        match self.samples.try_send(sample) {
            Ok(()) => stats.samples_sent += 1,
            Err(TrySendError::Full(_)) => stats.samples_dropped += 1,
            Err(TrySendError::Disconnected(_)) => {
                if stats.samples_dropped == 0 {
                    tracing::debug!("Sample receiver gone, samples are log-only");
                }
                stats.samples_dropped += 1;
            }
        }
    }

    fn finish(
        &self,
        outcome: Result<(), StallInfo>,
        stats: OrchestratorStats,
    ) -> HarnessResult<OrchestratorStats> {
        match outcome {
            Ok(()) => {
                tracing::debug!(
                    bursts = stats.bursts,
                    triggers = stats.triggers,
                    trigger_failures = stats.trigger_failures,
                    samples_dropped = stats.samples_dropped,
                    "Orchestrator finished"
                );
                Ok(stats)
            }
            Err(info) => {
                tracing::error!(thread = THREAD_NAME, stall = %info, "Barrier stall");
                self.ctx
                    .shutdown()
                    .request(StopReason::Stall(format!("{}: {}", THREAD_NAME, info)));
                Err(HarnessError::BarrierStall(info))
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("bait", &self.bait.name())
            .field("cpu_hint", &self.cpu_hint)
            .field("report_every", &self.ctx.config().report_every)
            .finish()
    }
}
