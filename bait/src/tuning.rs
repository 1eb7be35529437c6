//! Kernel writeback knobs under `/proc/sys/vm`
//!
//! Shorter writeback intervals and lower dirty thresholds make the kernel
//! flush more often, which widens the window the race needs. Every knob is
//! read and written independently; one failure never stops the others.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default location of the `vm` sysctl tree
pub const PROC_SYS_VM: &str = "/proc/sys/vm";

/// Errors touching a single knob
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    /// Reading the knob failed
    #[error("cannot read vm.{knob}: {source}")]
    Read {
        /// Knob name
        knob: &'static str,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Writing the knob failed (usually missing privileges)
    #[error("cannot set vm.{knob}: {source}")]
    Write {
        /// Knob name
        knob: &'static str,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The knob did not hold an integer
    #[error("vm.{knob} holds {value:?}, not an integer")]
    Parse {
        /// Knob name
        knob: &'static str,
        /// Raw contents
        value: String,
    },
}

/// One writeback knob and the value used in aggressive mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Knob {
    /// File name under the `vm` directory
    pub name: &'static str,
    /// Value written by [`WritebackTuning::apply_aggressive`]
    pub aggressive: u64,
}

/// The knobs shown at startup, in display order
pub const KNOBS: [Knob; 4] = [
    Knob {
        name: "dirty_writeback_centisecs",
        aggressive: 10,
    },
    Knob {
        name: "dirty_expire_centisecs",
        aggressive: 100,
    },
    Knob {
        name: "dirty_ratio",
        aggressive: 5,
    },
    Knob {
        name: "dirty_background_ratio",
        aggressive: 2,
    },
];

impl std::fmt::Display for Knob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm.{}", self.name)
    }
}

/// Outcome for one knob
pub type KnobResult = (Knob, Result<u64, TuningError>);

/// Reads and tunes the writeback knobs
#[derive(Debug, Clone)]
pub struct WritebackTuning {
    root: PathBuf,
}

impl Default for WritebackTuning {
    fn default() -> Self {
        Self::new()
    }
}

impl WritebackTuning {
    /// Tuning against the live `/proc/sys/vm`
    pub fn new() -> Self {
        Self::with_root(PROC_SYS_VM)
    }

    /// Tuning against another directory laid out like `/proc/sys/vm`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the knobs are read from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current value of every knob
    pub fn current(&self) -> Vec<KnobResult> {
        KNOBS.iter().map(|&knob| (knob, self.read(knob))).collect()
    }

    /// Write the aggressive value into every knob
    ///
    /// Returns the value written (or the failure) per knob.
    pub fn apply_aggressive(&self) -> Vec<KnobResult> {
        KNOBS
            .iter()
            .map(|&knob| {
                let result = self.write(knob, knob.aggressive).map(|()| knob.aggressive);
                match &result {
                    Ok(value) => tracing::info!(knob = %knob, value, "Writeback knob set"),
                    Err(e) => tracing::warn!(knob = %knob, error = %e, "Writeback knob unchanged"),
                }
                (knob, result)
            })
            .collect()
    }

    /// Read one knob
    pub fn read(&self, knob: Knob) -> Result<u64, TuningError> {
        let raw = fs::read_to_string(self.root.join(knob.name)).map_err(|source| {
            TuningError::Read {
                knob: knob.name,
                source,
            }
        })?;
        raw.trim().parse().map_err(|_| TuningError::Parse {
            knob: knob.name,
            value: raw.trim().to_owned(),
        })
    }

    /// Write one knob
    pub fn write(&self, knob: Knob, value: u64) -> Result<(), TuningError> {
        fs::write(self.root.join(knob.name), format!("{}\n", value)).map_err(|source| {
            TuningError::Write {
                knob: knob.name,
                source,
            }
        })
    }
}
