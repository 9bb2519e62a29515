//! Arena diagnostics
//!
//! Snapshots produced by [`ArenaAllocator::stats`](super::ArenaAllocator::stats)
//! and [`ArenaAllocator::info`](super::ArenaAllocator::info). They are plain
//! reads of allocator state; the text rendering is for humans and logs, not a
//! stable format.

use std::fmt;

use serde::Serialize;

use super::free_list::FreeBlock;

/// Accounting summary of one arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    /// Current high-water mark
    pub peak: usize,
    /// Highest peak seen over the allocator's lifetime
    pub max_peak: usize,
    /// Bytes held by live allocations
    pub used: usize,
    /// Bytes held by tracked free blocks
    pub free_bytes: usize,
    /// Number of tracked free blocks
    pub free_blocks: usize,
    /// Largest tracked free block
    pub largest_free_block: usize,
    /// Number of live allocations
    pub live_allocations: usize,
    /// Capacity of the bound physical block, if any
    pub bound_capacity: Option<usize>,
    /// Allocation granularity
    pub alignment: usize,
}

impl ArenaStats {
    /// Fragmentation ratio (0.0 = none, 1.0 = fully fragmented)
    ///
    /// - 0.0: no free blocks, or a single one
    /// - Higher values: free space scattered across many blocks
    pub fn fragmentation(&self) -> f32 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - (self.largest_free_block as f32 / self.free_bytes as f32)
    }
}

/// Full diagnostic dump: accounting plus the free-block layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArenaInfo {
    pub label: String,
    pub stats: ArenaStats,
    /// Free blocks in offset order
    pub layout: Vec<FreeBlock>,
}

impl fmt::Display for ArenaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        write!(
            f,
            "[{}] peak: {} bytes (max {}), used: {} bytes in {} allocations, free: {} bytes in {} blocks",
            self.label, s.peak, s.max_peak, s.used, s.live_allocations, s.free_bytes, s.free_blocks
        )?;
        match s.bound_capacity {
            Some(capacity) => write!(f, ", bound: {} bytes", capacity)?,
            None => write!(f, ", unbound")?,
        }
        for block in &self.layout {
            write!(f, "\n  free [{}, {}) {} bytes", block.offset, block.end(), block.size)?;
        }
        Ok(())
    }
}
