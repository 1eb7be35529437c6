//! burst-race-bait: concrete race bait for burst-race
//!
//! - [`FileBait`]: ext4 inline-data files converted to extents while their
//!   writeback is in flight
//! - [`WritebackTuning`]: the `vm.dirty_*` knobs that control how often
//!   that writeback happens

#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(unix)]
pub mod file;
pub mod tuning;

#[cfg(unix)]
pub use file::{FileBait, EXTENT_PAYLOAD_LEN, INLINE_PAYLOAD_LEN};
pub use tuning::{Knob, KnobResult, TuningError, WritebackTuning, KNOBS};
