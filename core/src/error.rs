//! Error types for burst-race-core

use thiserror::Error;

use crate::barrier::StallInfo;
use crate::persistence::PersistError;
use crate::traits::BaitError;

/// Core error type
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A builder was finalized without a required field
    #[error("missing required field: {0}")]
    MissingConfig(&'static str),

    /// A barrier wait exceeded the stall timeout
    #[error("barrier stalled: {0}")]
    BarrierStall(StallInfo),

    /// A role thread could not be started
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name
        name: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Race bait error that could not be absorbed as a miss
    #[error("race bait error: {0}")]
    Bait(#[from] BaitError),

    /// Persisted record error
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Error for a builder field that was never set
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Free-form configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error came from a barrier stall
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::BarrierStall(_))
    }
}

/// Result type alias
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
