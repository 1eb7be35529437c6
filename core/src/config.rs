//! Harness configuration types
//!
//! Out-of-range values are clamped into the documented bounds, never rejected.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default directory holding the race-bait files
pub const DEFAULT_WORK_DIR: &str = "/mnt/ext4-test/burst";

/// Default location of the persisted run record
pub const DEFAULT_STATE_PATH: &str = "/var/tmp/ext4-burst-state";

/// Work items per burst: default and bounds
pub const DEFAULT_ITEMS: usize = 1000;
/// Minimum work items per burst
pub const MIN_ITEMS: usize = 10;
/// Maximum work items per burst
pub const MAX_ITEMS: usize = 10_000;

/// Accumulator threads: default and bounds
pub const DEFAULT_ACCUMULATORS: usize = 1;
/// Minimum accumulator threads
pub const MIN_ACCUMULATORS: usize = 1;
/// Maximum accumulator threads
pub const MAX_ACCUMULATORS: usize = 16;

/// Mutator threads: default and bounds
pub const DEFAULT_MUTATORS: usize = 16;
/// Minimum mutator threads
pub const MIN_MUTATORS: usize = 1;
/// Maximum mutator threads
pub const MAX_MUTATORS: usize = 64;

const MIN_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(10);
const MIN_STALL_TIMEOUT: Duration = Duration::from_millis(1);

/// How a thread burns time while waiting on the phase register
///
/// Only the probability of hitting the race depends on this; the barrier is
/// correct under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPolicy {
    /// Busy spin with a CPU relax hint
    Spin,
    /// Yield the processor between polls
    Yield,
    /// Sleep for a fixed interval between polls
    Sleep(Duration),
}

impl PollPolicy {
    /// Pause once according to the policy
    #[inline]
    pub fn pause(&self) {
        match self {
            PollPolicy::Spin => std::hint::spin_loop(),
            PollPolicy::Yield => std::thread::yield_now(),
            PollPolicy::Sleep(interval) => std::thread::sleep(*interval),
        }
    }

    /// Whether each poll is cheap enough that clock reads should be amortized
    pub fn is_busy(&self) -> bool {
        !matches!(self, PollPolicy::Sleep(_))
    }
}

/// Harness configuration
///
/// Defines the shape of a run: where the race bait lives, how many items
/// each burst cycles, how many threads play each role and how they wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Directory holding the race-bait files
    pub work_dir: PathBuf,

    /// Work items created and mutated per burst
    pub items: usize,

    /// Accumulator threads (create and clean up items)
    pub accumulators: usize,

    /// Mutator threads (expand items during the race window)
    pub mutators: usize,

    /// Apply aggressive writeback tuning before the run
    pub aggressive: bool,

    /// Location of the persisted run record
    pub state_path: PathBuf,

    /// Poll policy for worker threads
    pub worker_poll: PollPolicy,

    /// Poll policy for the orchestrator thread
    pub orchestrator_poll: PollPolicy,

    /// How long any single barrier wait may last before it is reported as
    /// a stall; `None` waits forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_timeout: Option<Duration>,

    /// Cadence of crash-forensics snapshots
    pub snapshot_interval: Duration,

    /// Emit a throughput sample every N bursts
    pub report_every: u64,

    /// Pin role threads to logical processors
    pub pin_threads: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            items: DEFAULT_ITEMS,
            accumulators: DEFAULT_ACCUMULATORS,
            mutators: DEFAULT_MUTATORS,
            aggressive: false,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            worker_poll: PollPolicy::Yield,
            orchestrator_poll: PollPolicy::Sleep(Duration::from_micros(10)),
            stall_timeout: Some(Duration::from_secs(60)),
            snapshot_interval: Duration::from_secs(1),
            report_every: 10,
            pin_threads: true,
        }
    }
}

impl HarnessConfig {
    /// Create a new config rooted at the given work directory
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Set the number of work items per burst
    pub fn with_items(mut self, items: usize) -> Self {
        self.items = items;
        self
    }

    /// Set the number of accumulator threads
    pub fn with_accumulators(mut self, accumulators: usize) -> Self {
        self.accumulators = accumulators;
        self
    }

    /// Set the number of mutator threads
    pub fn with_mutators(mut self, mutators: usize) -> Self {
        self.mutators = mutators;
        self
    }

    /// Enable or disable aggressive mode
    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    /// Set the persisted record location
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    /// Set the worker poll policy
    pub fn with_worker_poll(mut self, poll: PollPolicy) -> Self {
        self.worker_poll = poll;
        self
    }

    /// Set the orchestrator poll policy
    pub fn with_orchestrator_poll(mut self, poll: PollPolicy) -> Self {
        self.orchestrator_poll = poll;
        self
    }

    /// Set the stall timeout
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the snapshot cadence
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the throughput sample cadence in bursts
    pub fn with_report_every(mut self, bursts: u64) -> Self {
        self.report_every = bursts;
        self
    }

    /// Enable or disable processor pinning
    pub fn with_pin_threads(mut self, pin: bool) -> Self {
        self.pin_threads = pin;
        self
    }

    /// Total number of worker threads (accumulators + mutators)
    pub fn total_workers(&self) -> usize {
        self.accumulators + self.mutators
    }

    /// Clamp every field into its supported range
    pub fn clamped(mut self) -> Self {
        self.items = clamp_logged("items", self.items, MIN_ITEMS, MAX_ITEMS);
        self.accumulators = clamp_logged(
            "accumulators",
            self.accumulators,
            MIN_ACCUMULATORS,
            MAX_ACCUMULATORS,
        );
        self.mutators = clamp_logged("mutators", self.mutators, MIN_MUTATORS, MAX_MUTATORS);

        if self.snapshot_interval < MIN_SNAPSHOT_INTERVAL {
            tracing::debug!(
                requested = ?self.snapshot_interval,
                "snapshot interval raised to minimum"
            );
            self.snapshot_interval = MIN_SNAPSHOT_INTERVAL;
        }
        if let Some(timeout) = self.stall_timeout {
            if timeout < MIN_STALL_TIMEOUT {
                self.stall_timeout = Some(MIN_STALL_TIMEOUT);
            }
        }
        self.report_every = self.report_every.max(1);
        self
    }
}

fn clamp_logged(field: &'static str, value: usize, min: usize, max: usize) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::debug!(field, requested = value, clamped, "config value clamped");
    }
    clamped
}
