//! Contiguous partitioning of the work-item index space

use std::ops::Range;

/// Half-open slice `[start, end)` of the item index space owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Partition {
    /// First owned index
    pub start: usize,
    /// One past the last owned index
    pub end: usize,
}

impl Partition {
    /// Partition `index` of `parts` over `total` items: `[i·F/W, (i+1)·F/W)`
    ///
    /// When `total < parts` some partitions are empty, but the union still
    /// covers `[0, total)` exactly once.
    pub fn of(total: usize, parts: usize, index: usize) -> Self {
        if parts == 0 {
            return Self::default();
        }
        let bound = |i: usize| ((i as u128 * total as u128) / parts as u128) as usize;
        Self {
            start: bound(index),
            end: bound(index + 1),
        }
    }

    /// Every partition of `total` over `parts`, in order
    pub fn split(total: usize, parts: usize) -> Vec<Self> {
        (0..parts).map(|i| Self::of(total, parts, i)).collect()
    }

    /// Number of owned items
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the partition owns nothing
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `index` is owned
    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    /// The owned indices
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}
