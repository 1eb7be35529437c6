//! Orchestrator for the externally triggered phase of each burst
//!
//! The Orchestrator is the single party that does not arrive at a quorum:
//! - Waits for the accumulators to publish `Trigger`
//! - Fires the race-bait trigger at every live item
//! - Opens the race window by publishing `Race`
//! - Waits for the mutators to close it, then counts the burst
//! - Emits a throughput sample every `report_every` bursts
//!
//! # Example
//!
//! ```ignore
//! use burst_race_core::orchestrator::Orchestrator;
//!
//! let (tx, rx) = std::sync::mpsc::sync_channel(64);
//! let orchestrator = Orchestrator::new(ctx, bait, tx);
//! let stats = orchestrator.run()?;
//! ```

mod executor;
mod sample;

pub use executor::Orchestrator;
pub use sample::{OrchestratorStats, ThroughputSample};
