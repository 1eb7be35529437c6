//! Fixed-capacity arena of work-item records
//!
//! Each slot holds the opaque token the race bait returned when it created
//! the item (a raw file descriptor for the file bait) and the item's
//! lifecycle state. Slots are handed between roles with plain atomics and
//! no lock: the barrier's phase transitions are the only ordering.

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use crate::error::{HarnessError, HarnessResult};
use crate::partition::Partition;

/// Opaque per-item token issued by the race bait
pub type RawToken = i32;

/// Token value of a vacant slot
pub const NO_TOKEN: RawToken = -1;

/// Largest arena the harness will build
pub const MAX_ARENA_CAPACITY: usize = 1 << 20;

/// Stable handle of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(u32);

impl ItemHandle {
    /// Slot index of this handle
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-burst lifecycle of a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemState {
    /// No external resource exists
    Vacant = 0,
    /// Created under threshold, handle retained
    Created = 1,
    /// Rewritten over threshold
    Mutated = 2,
}

impl ItemState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => ItemState::Created,
            2 => ItemState::Mutated,
            _ => ItemState::Vacant,
        }
    }
}

#[derive(Debug)]
struct ItemSlot {
    token: AtomicI32,
    state: AtomicU8,
}

impl ItemSlot {
    fn vacant() -> Self {
        Self {
            token: AtomicI32::new(NO_TOKEN),
            state: AtomicU8::new(ItemState::Vacant as u8),
        }
    }
}

/// Arena of work items addressed by [`ItemHandle`]
#[derive(Debug)]
pub struct WorkItemArena {
    slots: Box<[ItemSlot]>,
}

impl WorkItemArena {
    /// Build an arena of `capacity` vacant slots
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `capacity` is zero or above
    /// [`MAX_ARENA_CAPACITY`].
    pub fn new(capacity: usize) -> HarnessResult<Self> {
        if capacity == 0 || capacity > MAX_ARENA_CAPACITY {
            return Err(HarnessError::config(format!(
                "arena capacity {} outside 1..={}",
                capacity, MAX_ARENA_CAPACITY
            )));
        }
        let slots = (0..capacity).map(|_| ItemSlot::vacant()).collect();
        Ok(Self { slots })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Handle for `index`, if in bounds
    pub fn handle(&self, index: usize) -> Option<ItemHandle> {
        (index < self.slots.len()).then(|| ItemHandle(index as u32))
    }

    /// Handles of every slot in `partition` that lies inside the arena
    pub fn handles(&self, partition: Partition) -> impl Iterator<Item = ItemHandle> {
        let end = partition.end.min(self.slots.len());
        (partition.start.min(end)..end).map(|index| ItemHandle(index as u32))
    }

    /// Record the token of a freshly created item
    ///
    /// Returns the token that was in the slot before, if any.
    pub fn install(&self, handle: ItemHandle, token: RawToken) -> Option<RawToken> {
        let slot = &self.slots[handle.index()];
        let previous = slot.token.swap(token, Ordering::AcqRel);
        slot.state.store(ItemState::Created as u8, Ordering::Release);
        (previous != NO_TOKEN).then_some(previous)
    }

    /// Current token, if the item exists
    pub fn token(&self, handle: ItemHandle) -> Option<RawToken> {
        let token = self.slots[handle.index()].token.load(Ordering::Acquire);
        (token != NO_TOKEN).then_some(token)
    }

    /// Mark an item as rewritten over threshold
    pub fn mark_mutated(&self, handle: ItemHandle) {
        self.slots[handle.index()]
            .state
            .store(ItemState::Mutated as u8, Ordering::Release);
    }

    /// Vacate the slot, returning its token if it held one
    pub fn take(&self, handle: ItemHandle) -> Option<RawToken> {
        let slot = &self.slots[handle.index()];
        let token = slot.token.swap(NO_TOKEN, Ordering::AcqRel);
        slot.state.store(ItemState::Vacant as u8, Ordering::Release);
        (token != NO_TOKEN).then_some(token)
    }

    /// Lifecycle state of an item
    pub fn state(&self, handle: ItemHandle) -> ItemState {
        ItemState::from_u8(self.slots[handle.index()].state.load(Ordering::Acquire))
    }

    /// Every item currently holding a token
    pub fn live(&self) -> impl Iterator<Item = (ItemHandle, RawToken)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let token = slot.token.load(Ordering::Acquire);
            (token != NO_TOKEN).then_some((ItemHandle(index as u32), token))
        })
    }

    /// Number of items currently holding a token
    pub fn live_count(&self) -> usize {
        self.live().count()
    }
}
