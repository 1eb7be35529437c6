//! Periodic snapshots of the run state

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::record::RunRecord;
use super::store::StateStore;
use super::PersistError;
use crate::context::RunContext;
use crate::error::{HarnessError, HarnessResult};

/// Longest single sleep of the snapshot timer between shutdown checks
const TIMER_SLICE: Duration = Duration::from_millis(25);

/// Writes run snapshots to a [`StateStore`]
pub struct CrashPersistence {
    store: Arc<StateStore>,
    ctx: Arc<RunContext>,
    failures: AtomicU64,
}

impl CrashPersistence {
    /// Snapshotter for the run described by `ctx`
    pub fn new(store: Arc<StateStore>, ctx: Arc<RunContext>) -> Self {
        Self {
            store,
            ctx,
            failures: AtomicU64::new(0),
        }
    }

    /// Persist the current counters with `status`
    ///
    /// The record is marked running until shutdown has been requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written and synced.
    pub fn snapshot(&self, status: &str) -> Result<(), PersistError> {
        self.write(!self.ctx.shutdown().is_requested(), status)
    }

    /// Persist the current counters marked as no longer running
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written and synced.
    pub fn snapshot_stopped(&self, status: &str) -> Result<(), PersistError> {
        self.write(false, status)
    }

    /// Failed writes so far
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Start the snapshot thread
    ///
    /// The thread snapshots every `interval` until shutdown is requested,
    /// then writes a final stopped record carrying the stop reason's status
    /// text and exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_timer(self: Arc<Self>, interval: Duration) -> HarnessResult<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("snapshot".to_owned())
            .spawn(move || self.run_timer(interval))
            .map_err(|source| HarnessError::Spawn {
                name: "snapshot".to_owned(),
                source,
            })
    }

    fn run_timer(&self, interval: Duration) {
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Snapshot timer started");

        while self.sleep_interval(interval) {
            self.record("running");
        }

        let status = self
            .ctx
            .shutdown()
            .reason()
            .map(|reason| reason.status_text())
            .unwrap_or("stopped");
        if let Err(e) = self.snapshot_stopped(status) {
            self.log_failure(&e);
        }
        tracing::debug!(status, "Snapshot timer stopped");
    }

    /// Sleep for `interval` in short slices; `false` once shutdown is seen
    fn sleep_interval(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        loop {
            if self.ctx.shutdown().is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(TIMER_SLICE));
        }
    }

    /// Snapshot, absorbing failures into the log
    pub fn record(&self, status: &str) {
        if let Err(e) = self.snapshot(status) {
            self.log_failure(&e);
        }
    }

    fn write(&self, running: bool, status: &str) -> Result<(), PersistError> {
        let record = RunRecord::new(
            self.ctx.started_wall().timestamp(),
            Utc::now().timestamp(),
            self.ctx.stats().snapshot(),
            running,
            status,
        );
        self.store.write(&record)
    }

    fn log_failure(&self, error: &PersistError) {
        if self.failures.fetch_add(1, Ordering::Relaxed) == 0 {
            tracing::warn!(
                path = %self.store.path().display(),
                error = %error,
                "Snapshot failed; continuing without crash forensics"
            );
        } else {
            tracing::debug!(error = %error, "Snapshot failed");
        }
    }
}

impl std::fmt::Debug for CrashPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashPersistence")
            .field("path", &self.store.path())
            .field("failures", &self.failures())
            .finish()
    }
}
