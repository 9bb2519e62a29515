//! Free-list manager for arena offsets
//!
//! Free ranges are indexed twice: by offset for adjacency checks and by
//! `(size, offset)` for best-fit search. Both indexes hold plain keys, so
//! every operation is logarithmic in the number of free blocks.

use std::collections::{BTreeMap, BTreeSet};

/// Free byte range within the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FreeBlock {
    /// Byte offset from arena start
    pub offset: usize,
    /// Size in bytes
    pub size: usize,
}

impl FreeBlock {
    pub fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of this block
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Check if the two ranges share at least one byte
    pub fn overlaps(&self, other: &FreeBlock) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Dual-indexed set of free blocks
#[derive(Debug, Default, Clone)]
pub struct FreeList {
    /// offset -> size
    by_offset: BTreeMap<usize, usize>,
    /// (size, offset), smallest first then lowest offset
    by_size: BTreeSet<(usize, usize)>,
    total: usize,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of free blocks
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Sum of all free block sizes
    pub fn total_bytes(&self) -> usize {
        self.total
    }

    /// Size of the largest free block, 0 when empty
    pub fn largest(&self) -> usize {
        self.by_size.iter().next_back().map_or(0, |&(size, _)| size)
    }

    /// Free blocks in offset order
    pub fn iter(&self) -> impl Iterator<Item = FreeBlock> + '_ {
        self.by_offset
            .iter()
            .map(|(&offset, &size)| FreeBlock::new(offset, size))
    }

    /// Free block starting exactly at `offset`
    pub fn get(&self, offset: usize) -> Option<FreeBlock> {
        self.by_offset
            .get(&offset)
            .map(|&size| FreeBlock::new(offset, size))
    }

    /// Free block ending exactly at `end`
    pub fn ending_at(&self, end: usize) -> Option<FreeBlock> {
        self.by_offset
            .range(..end)
            .next_back()
            .map(|(&offset, &size)| FreeBlock::new(offset, size))
            .filter(|block| block.end() == end)
    }

    /// Check whether any free block shares a byte with `[offset, offset + size)`
    pub fn overlaps(&self, offset: usize, size: usize) -> bool {
        let probe = FreeBlock::new(offset, size);
        let before = self
            .by_offset
            .range(..=offset)
            .next_back()
            .map(|(&o, &s)| FreeBlock::new(o, s));
        let after = self
            .by_offset
            .range(offset..)
            .next()
            .map(|(&o, &s)| FreeBlock::new(o, s));

        before.is_some_and(|b| b.overlaps(&probe)) || after.is_some_and(|b| b.overlaps(&probe))
    }

    /// Track a block as-is, without coalescing
    ///
    /// The caller guarantees `block` overlaps no tracked block.
    pub fn insert(&mut self, block: FreeBlock) {
        debug_assert!(block.size > 0, "empty free block at {}", block.offset);
        debug_assert!(!self.overlaps(block.offset, block.size));

        self.by_offset.insert(block.offset, block.size);
        self.by_size.insert((block.size, block.offset));
        self.total += block.size;
    }

    /// Stop tracking the block starting at `offset`
    pub fn remove(&mut self, offset: usize) -> Option<FreeBlock> {
        let size = self.by_offset.remove(&offset)?;
        self.by_size.remove(&(size, offset));
        self.total -= size;
        Some(FreeBlock::new(offset, size))
    }

    /// Insert a block, merging it with free neighbours on either side
    ///
    /// Returns the block actually tracked after merging.
    pub fn insert_coalesced(&mut self, block: FreeBlock) -> FreeBlock {
        let mut merged = block;

        if let Some(left) = self.ending_at(merged.offset) {
            self.remove(left.offset);
            merged = FreeBlock::new(left.offset, left.size + merged.size);
        }

        if let Some(right) = self.get(merged.end()) {
            self.remove(right.offset);
            merged.size += right.size;
        }

        if merged != block {
            tracing::trace!(
                "FreeList: coalesced [{}, {}) into [{}, {})",
                block.offset,
                block.end(),
                merged.offset,
                merged.end()
            );
        }

        self.insert(merged);
        merged
    }

    /// Remove and return the smallest block of at least `size` bytes
    ///
    /// Ties between equal sizes go to the lowest offset.
    pub fn take_best_fit(&mut self, size: usize) -> Option<FreeBlock> {
        let &(_, offset) = self.by_size.range((size, 0)..).next()?;
        self.remove(offset)
    }
}
