//! Worker module for the per-thread role state machines
//!
//! A Worker owns a contiguous partition of the work-item arena and a list of
//! phase bindings. Its whole life is one loop:
//!
//! 1. Wait until the bound phase becomes current
//! 2. Apply the bound action (create, mutate or release) to every owned item
//! 3. Flush exact pass counts to the shared aggregator
//! 4. Arrive at the barrier and wait for the quorum
//! 5. Move on to the next binding, wrapping after the last
//!
//! Shutdown is checked at every wait and between items, never inside a race
//! bait call.
//!
//! # Example
//!
//! ```ignore
//! use burst_race_core::worker::{Role, WorkerBuilder};
//!
//! let worker = WorkerBuilder::new(0, Role::Mutator)
//!     .context(ctx)
//!     .bait(bait)
//!     .build()?;
//!
//! let stats = worker.run()?;
//! println!("Mutated: {}", stats.mutated);
//! ```

mod affinity;
mod builder;
mod executor;
mod role;
mod stats;

pub use affinity::pin_to_cpu;
pub use builder::WorkerBuilder;
pub use executor::Worker;
pub use role::{Action, Binding, Role, WorkerRecord, WorkerState};
pub use stats::WorkerStats;

#[cfg(test)]
mod tests;
