//! The race-bait collaborator trait
//!
//! The trait is defined in core so the barrier machinery stays independent
//! of what is actually being raced. Implementations live in their own crate
//! (`bait/`).

use std::io;

use crate::arena::{ItemHandle, RawToken};

// ============================================================================
// Race Bait Trait
// ============================================================================

/// External operations performed on work items at specific phases
///
/// # Contract
///
/// - Every method may be called concurrently for *different* items from
///   different threads.
/// - Calls may take arbitrarily long in the target system; the harness only
///   waits for the call itself to return.
/// - A token returned by [`create`](RaceBait::create) stays valid until it is
///   passed to [`release`](RaceBait::release). The harness never calls
///   `trigger`/`mutate` with a token after releasing it.
pub trait RaceBait: Send + Sync {
    /// Identifier used in logs (e.g. "ext4-inline")
    fn name(&self) -> &str;

    /// One-time setup before any thread starts
    fn prepare(&self, _capacity: usize) -> Result<(), BaitError> {
        Ok(())
    }

    /// Create `item` with an under-threshold payload and keep its handle open
    fn create(&self, item: ItemHandle) -> Result<RawToken, BaitError>;

    /// Ask the target to start acting on `item` without waiting for it
    fn trigger(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError>;

    /// Rewrite `item` with an over-threshold payload
    fn mutate(&self, item: ItemHandle, token: RawToken) -> Result<(), BaitError>;

    /// Close the handle (if any) and delete `item`
    fn release(&self, item: ItemHandle, token: Option<RawToken>) -> Result<(), BaitError>;
}

/// Race-bait errors
#[derive(Debug, thiserror::Error)]
pub enum BaitError {
    /// An operation on an item failed
    #[error("{op} failed on item {item}: {source}")]
    Io {
        /// Operation name ("create", "mutate", ...)
        op: &'static str,
        /// Item the operation targeted
        item: ItemHandle,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The handle lies outside the bait's item table
    #[error("unknown item {0}")]
    UnknownItem(ItemHandle),

    /// Setup failed before the run
    #[error("prepare failed: {0}")]
    Prepare(#[source] io::Error),
}

impl BaitError {
    /// Build an [`BaitError::Io`]
    pub fn io(op: &'static str, item: ItemHandle, source: io::Error) -> Self {
        BaitError::Io { op, item, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::WorkItemArena;

    #[test]
    fn test_error_display() {
        let arena = WorkItemArena::new(1).unwrap();
        let item = arena.handle(0).unwrap();
        let err = BaitError::io("mutate", item, io::Error::other("boom"));
        let text = err.to_string();
        assert!(text.contains("mutate"));
        assert!(text.contains("#0"));
    }
}
