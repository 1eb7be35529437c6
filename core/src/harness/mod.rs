//! Harness for run lifecycle management
//!
//! The Harness coordinates a complete run:
//! - Preparing the race bait and writing the first run record
//! - Spawning the snapshot timer, the orchestrator and every worker
//! - Managing graceful shutdown via the shared signal
//! - Collecting results from all threads
//! - Releasing leftover items and removing the run record
//!
//! # Example
//!
//! ```ignore
//! use burst_race_core::HarnessBuilder;
//!
//! let (harness, samples) = HarnessBuilder::new()
//!     .work_dir("/mnt/ext4-test/burst")
//!     .mutators(16)
//!     .bait(bait)
//!     .build()?;
//!
//! let summary = harness.run_with_signal_handling()?;
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_worker_stats, AggregatedStats, RecordDisposition, RunSummary};
pub use builder::HarnessBuilder;
pub use executor::Harness;

#[cfg(test)]
mod tests;
