//! Roles, phase bindings and the shared per-worker record

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use serde::Serialize;

use crate::barrier::Phase;
use crate::partition::Partition;

/// Role a worker plays in every burst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates items under threshold, later deletes them
    Accumulator,
    /// Rewrites items over threshold inside the race window
    Mutator,
}

impl Role {
    /// Thread-name prefix and log label
    pub fn name(&self) -> &'static str {
        match self {
            Role::Accumulator => "accumulator",
            Role::Mutator => "mutator",
        }
    }

    /// Phase bindings of this role, with `quorum` parties sharing it
    pub fn bindings(&self, quorum: u32) -> Vec<Binding> {
        match self {
            Role::Accumulator => vec![
                Binding::new(Phase::Accumulate, Action::Create, Some(quorum)),
                Binding::new(Phase::Cleanup, Action::Release, Some(quorum)),
            ],
            Role::Mutator => vec![Binding::new(Phase::Race, Action::Mutate, Some(quorum))],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a worker does to its partition when a bound phase is current
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create each item and keep its token
    Create,
    /// Rewrite each live item over threshold
    Mutate,
    /// Close and delete each item
    Release,
}

/// One phase a worker takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Phase that triggers the action
    pub phase: Phase,
    /// Action taken on the worker's partition
    pub action: Action,
    /// Arrival quorum after acting; `None` waits out the phase instead
    pub quorum: Option<u32>,
}

impl Binding {
    /// Bind `action` to `phase`
    pub const fn new(phase: Phase, action: Action, quorum: Option<u32>) -> Self {
        Self {
            phase,
            action,
            quorum,
        }
    }
}

/// State-machine state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Spawned, not yet waiting
    Idle = 0,
    /// Polling for a bound phase
    WaitForPhase = 1,
    /// Acting on the partition
    Act = 2,
    /// Arrived, waiting for the quorum
    Arrive = 3,
    /// Left the loop
    Stopped = 4,
}

impl WorkerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::WaitForPhase,
            2 => WorkerState::Act,
            3 => WorkerState::Arrive,
            4 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// Identity and live state of one worker, readable from any thread
#[derive(Debug)]
pub struct WorkerRecord {
    /// Index within the role
    pub id: usize,
    /// Role played
    pub role: Role,
    /// Logical processor the worker asks to be pinned to
    pub cpu_hint: Option<usize>,
    /// Items owned by the worker
    pub partition: Partition,
    alive: AtomicBool,
    state: AtomicU8,
}

impl WorkerRecord {
    /// Record for a worker that has not started yet
    pub fn new(id: usize, role: Role, cpu_hint: Option<usize>, partition: Partition) -> Self {
        Self {
            id,
            role,
            cpu_hint,
            partition,
            alive: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }

    /// Whether the worker thread is inside its loop
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Current state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Thread name, e.g. `mutator-3`
    pub fn thread_name(&self) -> String {
        format!("{}-{}", self.role.name(), self.id)
    }

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}
