//! burst-race-core: phase-synchronized burst orchestration with crash forensics
//!
//! This crate provides the machinery that lines many threads up into tight
//! burst windows around an external race, including:
//!
//! - The phase barrier and the role state machines bound to it
//! - The orchestrator driving the externally triggered phase
//! - Run-wide counters and throughput samples
//! - Crash-persistent run records and startup crash detection
//! - The race-bait trait implemented by concrete targets
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod barrier;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod harness;
pub mod orchestrator;
pub mod partition;
pub mod persistence;
pub mod shutdown;
pub mod stats;
pub mod traits;
pub mod worker;

pub use arena::{ItemHandle, ItemState, RawToken, WorkItemArena};
pub use barrier::{Phase, PhaseBarrier, StallInfo};
pub use channel::ChannelConfig;
pub use config::{HarnessConfig, PollPolicy};
pub use context::RunContext;
pub use error::*;
pub use harness::{Harness, HarnessBuilder, RecordDisposition, RunSummary};
pub use orchestrator::{Orchestrator, OrchestratorStats, ThroughputSample};
pub use partition::Partition;
pub use persistence::{CrashPersistence, CrashReport, PersistError, RunRecord, StateStore};
pub use shutdown::{ShutdownSignal, StopReason};
pub use stats::{StatsAggregator, StatsSnapshot};
pub use traits::*;
pub use worker::{Role, Worker, WorkerBuilder, WorkerStats};
