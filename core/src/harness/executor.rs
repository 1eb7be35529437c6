//! Harness execution logic

use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};
use crate::orchestrator::{Orchestrator, OrchestratorStats, ThroughputSample};
use crate::persistence::{CrashPersistence, StateStore};
use crate::shutdown::{PanicGuard, ShutdownSignal, StopReason};
use crate::traits::RaceBait;
use crate::worker::{Role, WorkerBuilder, WorkerStats};

use super::aggregator::{aggregate_worker_stats, RecordDisposition, RunSummary};

/// Longest single sleep of the run-duration timer between shutdown checks
const DEADLINE_SLICE: Duration = Duration::from_millis(50);

type WorkerHandle = (String, JoinHandle<HarnessResult<WorkerStats>>);

/// Harness manages the run lifecycle
///
/// Responsible for spawning every role thread, coordinating shutdown,
/// collecting results, releasing whatever is left, and clearing the
/// persisted record.
pub struct Harness {
    /// Shared run context
    ctx: Arc<RunContext>,

    /// Race bait (shared across all threads)
    bait: Arc<dyn RaceBait>,

    /// Persisted record store
    store: Arc<StateStore>,

    /// Sample sender (moved into the orchestrator)
    samples: SyncSender<ThroughputSample>,
}

impl Harness {
    /// Create a new harness
    ///
    /// Use `HarnessBuilder` for a more ergonomic construction.
    pub fn new(
        ctx: Arc<RunContext>,
        bait: Arc<dyn RaceBait>,
        store: Arc<StateStore>,
        samples: SyncSender<ThroughputSample>,
    ) -> Self {
        Self {
            ctx,
            bait,
            store,
            samples,
        }
    }

    /// The run context
    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Owned handle to the shutdown signal
    pub fn shutdown_handle(&self) -> Arc<ShutdownSignal> {
        self.ctx.shutdown_handle()
    }

    /// Trigger shutdown of every thread
    pub fn shutdown(&self) {
        self.ctx.shutdown().request(StopReason::UserRequest);
    }

    /// Run until shutdown
    ///
    /// Spawns the snapshot timer, the orchestrator and every worker, waits for
    /// all of them, releases leftover items and removes the persisted record.
    /// A barrier stall or thread panic ends the run early and is reported in
    /// the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the race bait cannot be prepared or a thread
    /// cannot be spawned (after stopping and joining whatever did start).
    pub fn run(self) -> HarnessResult<RunSummary> {
        let _guard = PanicGuard::new(self.ctx.shutdown(), "harness");
        let config = self.ctx.config();

        tracing::info!(
            bait = self.bait.name(),
            work_dir = %config.work_dir.display(),
            items = config.items,
            accumulators = config.accumulators,
            mutators = config.mutators,
            state_path = %self.store.path().display(),
            "Starting run"
        );

        self.bait.prepare(config.items)?;

        let persistence = Arc::new(CrashPersistence::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ctx),
        ));
        persistence.record("starting");

        let timer = match Arc::clone(&persistence).spawn_timer(config.snapshot_interval) {
            Ok(timer) => timer,
            Err(e) => {
                self.remove_record();
                return Err(e);
            }
        };

        let mut spawn_error = None;
        let orchestrator = match self.spawn_orchestrator() {
            Ok(handle) => Some(handle),
            Err(e) => {
                spawn_error = Some(e);
                None
            }
        };

        let mut workers: Vec<WorkerHandle> = Vec::with_capacity(config.total_workers());
        if spawn_error.is_none() {
            if let Err(e) = self.spawn_workers(&mut workers) {
                spawn_error = Some(e);
            }
        }
        if let Some(e) = &spawn_error {
            tracing::error!(error = %e, "Startup failed, stopping spawned threads");
            self.ctx
                .shutdown()
                .request(StopReason::Error(e.to_string()));
        } else {
            tracing::info!(threads = workers.len() + 1, "All role threads running");
        }

        let mut thread_failures = 0;
        let orchestrator_stats = orchestrator.and_then(|handle| {
            let stats = join_role("orchestrator", handle);
            if stats.is_none() {
                thread_failures += 1;
            }
            stats
        });

        let mut worker_stats = Vec::with_capacity(workers.len());
        for (name, handle) in workers {
            match join_role(&name, handle) {
                Some(stats) => worker_stats.push(stats),
                None => thread_failures += 1,
            }
        }

        // Role threads only exit on shutdown; this covers the timer regardless.
        self.ctx.shutdown().request(StopReason::UserRequest);
        if timer.join().is_err() {
            tracing::warn!("Snapshot timer panicked");
        }

        let swept = self.sweep();
        let record = self.remove_record();

        if let Some(e) = spawn_error {
            return Err(e);
        }

        let summary = self.summarize(worker_stats, orchestrator_stats, thread_failures, swept, record);
        tracing::info!(
            runtime_secs = summary.runtime.as_secs_f64(),
            bursts = summary.totals.bursts,
            operations = summary.totals.operations,
            rate = summary.ops_per_sec,
            reason = ?summary.stop_reason,
            "Run finished"
        );
        Ok(summary)
    }

    /// Run with SIGINT/SIGTERM handling
    ///
    /// Automatically triggers graceful shutdown when either signal arrives.
    pub fn run_with_signal_handling(self) -> HarnessResult<RunSummary> {
        #[cfg(unix)]
        {
            let listener = crate::shutdown::SignalListener::register_with_store(
                self.shutdown_handle(),
                Some(Arc::clone(&self.store)),
            )?;
            let result = self.run();
            listener.close();
            result
        }
        #[cfg(not(unix))]
        {
            self.run()
        }
    }

    /// Run with a timeout
    ///
    /// Automatically triggers shutdown when the timeout is reached.
    pub fn run_with_timeout(self, timeout: Duration) -> HarnessResult<RunSummary> {
        let shutdown = self.shutdown_handle();
        let deadline = Instant::now() + timeout;

        let timer = thread::Builder::new()
            .name("run-timer".to_owned())
            .spawn(move || {
                while !shutdown.is_requested() {
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::info!("Timeout reached, initiating shutdown...");
                        shutdown.request(StopReason::Completed);
                        break;
                    }
                    thread::sleep((deadline - now).min(DEADLINE_SLICE));
                }
            })
            .map_err(|source| HarnessError::Spawn {
                name: "run-timer".to_owned(),
                source,
            })?;

        let shutdown = self.shutdown_handle();
        let result = self.run();
        // Startup failures return before anything raised shutdown.
        shutdown.request(StopReason::UserRequest);
        if timer.join().is_err() {
            tracing::warn!("Run timer panicked");
        }
        result
    }

    fn spawn_orchestrator(&self) -> HarnessResult<JoinHandle<HarnessResult<OrchestratorStats>>> {
        let orchestrator = Orchestrator::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.bait),
            self.samples.clone(),
        );
        thread::Builder::new()
            .name("orchestrator".to_owned())
            .spawn(move || orchestrator.run())
            .map_err(|source| HarnessError::Spawn {
                name: "orchestrator".to_owned(),
                source,
            })
    }

    /// Spawn accumulators then mutators; processor 0 belongs to the
    /// orchestrator
    fn spawn_workers(&self, handles: &mut Vec<WorkerHandle>) -> HarnessResult<()> {
        let config = self.ctx.config();
        let roles = (0..config.accumulators)
            .map(|id| (Role::Accumulator, id))
            .chain((0..config.mutators).map(|id| (Role::Mutator, id)));

        for (cpu, (role, id)) in roles.enumerate() {
            let worker = WorkerBuilder::new(id, role)
                .context(Arc::clone(&self.ctx))
                .bait(Arc::clone(&self.bait))
                .cpu_hint(Some(cpu + 1))
                .build()?;
            let name = worker.record().thread_name();

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker.run())
                .map_err(|source| HarnessError::Spawn {
                    name: name.clone(),
                    source,
                })?;
            handles.push((name, handle));
        }
        Ok(())
    }

    /// Release every item still live once no thread can touch it
    fn sweep(&self) -> u64 {
        let arena = self.ctx.arena();
        let mut swept = 0u64;
        let live: Vec<_> = arena.live().collect();

        for (item, _) in live {
            let token = arena.take(item);
            match self.bait.release(item, token) {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!(%item, error = %e, "Final release failed"),
            }
        }
        if swept > 0 {
            tracing::debug!(swept, "Released leftover items");
        }
        swept
    }

    fn remove_record(&self) -> RecordDisposition {
        match self.store.remove() {
            Ok(true) => RecordDisposition::Removed,
            Ok(false) => RecordDisposition::Absent,
            Err(e) => {
                tracing::warn!(error = %e, "Could not remove run record");
                RecordDisposition::Failed(e.to_string())
            }
        }
    }

    fn summarize(
        &self,
        worker_stats: Vec<WorkerStats>,
        orchestrator: Option<OrchestratorStats>,
        thread_failures: usize,
        swept: u64,
        record: RecordDisposition,
    ) -> RunSummary {
        let runtime = self.ctx.elapsed();
        let totals = self.ctx.stats().snapshot();
        RunSummary {
            runtime,
            totals,
            ops_per_sec: totals.operations_per_second(runtime),
            stop_reason: self.ctx.shutdown().reason(),
            workers: aggregate_worker_stats(&worker_stats),
            orchestrator,
            thread_failures,
            swept,
            record,
        }
    }
}

/// Join a role thread, logging anything but a clean return
fn join_role<T>(name: &str, handle: JoinHandle<HarnessResult<T>>) -> Option<T> {
    match handle.join() {
        Ok(Ok(stats)) => {
            tracing::debug!(thread = name, "Thread completed");
            Some(stats)
        }
        Ok(Err(e)) => {
            tracing::error!(thread = name, error = %e, "Thread returned error");
            None
        }
        Err(_) => {
            tracing::error!(thread = name, "Thread panicked");
            None
        }
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", self.ctx.config())
            .field("bait", &self.bait.name())
            .field("state_path", &self.store.path())
            .finish()
    }
}
