//! Crash-forensics persistence
//!
//! A small fixed-layout record is rewritten every snapshot interval while
//! the run is live. If the target system takes the whole machine down, the
//! record left on disk still says "running", and the next invocation reports
//! it as a crash.
//!
//! Persistence failures never stop a run: they are logged and the run
//! continues without forensics.

mod record;
mod store;
mod timer;

use std::io;
use std::path::PathBuf;

pub use record::{truncate_status, RunRecord, RECORD_LEN, STATUS_MAX_LEN, STATUS_WIDTH};
pub use store::{CrashReport, StateStore};
pub use timer::CrashPersistence;

/// Persisted record errors
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem operation on the record failed
    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        /// Operation name
        op: &'static str,
        /// Record location
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The record on disk is shorter than the fixed layout
    #[error("record is {len} bytes, expected {expected}")]
    Truncated {
        /// Bytes found
        len: usize,
        /// Bytes required
        expected: usize,
    },
}
