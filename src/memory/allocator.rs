//! Offset allocator for a single tensor arena
//!
//! `ArenaAllocator` hands out byte offsets inside one zero-based arena and
//! reclaims them on free. Offsets are stable: a granted range is never moved.
//! Physical memory is only touched by [`ArenaAllocator::get_ptr`], which
//! binds the whole arena to one block sized to the current peak.
//!
//! # Invariants
//!
//! - Live ranges and free blocks never overlap and together tile `[0, peak)`.
//! - No two free blocks are adjacent; frees coalesce immediately.
//! - No free block ends at `peak`; a trailing free shrinks `peak` instead.
//! - `peak` and every granted size are multiples of the alignment.

use std::collections::BTreeMap;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{HostRuntime, MemoryRuntime};
use crate::config::AllocatorConfig;
use crate::error::{PlanError, PlanResult};

use super::binder::ArenaBinder;
use super::free_list::{FreeBlock, FreeList};
use super::stats::{ArenaInfo, ArenaStats};

/// Ownership token for one granted range
///
/// Returned by [`ArenaAllocator::alloc_block`] and consumed by
/// [`ArenaAllocator::free_block`]. It is not `Clone`, so a
/// range cannot be freed twice through handles.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping an ArenaBlock leaks its range until the allocator is dropped"]
pub struct ArenaBlock {
    offset: usize,
    size: usize,
    generation: u64,
}

impl ArenaBlock {
    /// Byte offset from the arena base
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Granted size in bytes (already aligned)
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocation sequence number, unique within one allocator
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveRange {
    size: usize,
    generation: u64,
}

/// Single-arena offset allocator with best-fit reuse and lazy binding
///
/// # Thread Safety
///
/// Not designed for concurrent use. Each memory plan owns its allocator;
/// sharing one across threads needs an external `Mutex`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use planforge::backend::HostRuntime;
/// use planforge::memory::ArenaAllocator;
///
/// let mut arena = ArenaAllocator::new(Arc::new(HostRuntime::new()));
/// let a = arena.alloc(48)?;
/// let b = arena.alloc(48)?;
/// arena.free(a, 48)?;
/// assert_eq!(arena.alloc(48)?, a);
///
/// let base = arena.get_ptr()?;
/// let _b_ptr = unsafe { base.as_ptr().add(b) };
/// # Ok::<(), planforge::PlanError>(())
/// ```
pub struct ArenaAllocator<R: MemoryRuntime = HostRuntime> {
    config: AllocatorConfig,
    peak: usize,
    max_peak: usize,
    used: usize,
    free_list: FreeList,
    /// Live allocations: offset -> range
    live: BTreeMap<usize, LiveRange>,
    next_generation: u64,
    binder: ArenaBinder<R>,
}

impl<R: MemoryRuntime> ArenaAllocator<R> {
    /// Create an allocator with the default configuration
    pub fn new(runtime: Arc<R>) -> Self {
        Self::build(runtime, AllocatorConfig::default())
    }

    /// Create an allocator with a custom configuration
    ///
    /// # Errors
    /// - If the alignment is not a non-zero power of two
    /// - If the label is empty
    pub fn with_config(runtime: Arc<R>, config: AllocatorConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(Self::build(runtime, config))
    }

    fn build(runtime: Arc<R>, config: AllocatorConfig) -> Self {
        tracing::debug!(
            "ArenaAllocator '{}' created on {} runtime (alignment={})",
            config.label,
            runtime.name(),
            config.alignment
        );
        Self {
            config,
            peak: 0,
            max_peak: 0,
            used: 0,
            free_list: FreeList::new(),
            live: BTreeMap::new(),
            next_generation: 0,
            binder: ArenaBinder::new(runtime),
        }
    }

    /// Reserve `size` bytes and return their offset
    ///
    /// The size is rounded up to the alignment. The smallest free block that
    /// fits is reused (lowest offset on ties) and split if larger; otherwise
    /// the arena grows at `peak`.
    ///
    /// # Errors
    /// - `InvalidSize` if `size` is zero or overflows when aligned
    pub fn alloc(&mut self, size: usize) -> PlanResult<usize> {
        self.alloc_block(size).map(|block| block.offset)
    }

    /// Same as [`alloc`](Self::alloc) but returns an ownership token
    pub fn alloc_block(&mut self, size: usize) -> PlanResult<ArenaBlock> {
        if size == 0 {
            return Err(PlanError::InvalidSize(0));
        }
        let size = self.aligned_size(size)?;

        let offset = match self.free_list.take_best_fit(size) {
            Some(block) => {
                if block.size > size {
                    self.free_list
                        .insert(FreeBlock::new(block.offset + size, block.size - size));
                }
                block.offset
            }
            None => {
                let offset = self.peak;
                self.peak = offset
                    .checked_add(size)
                    .ok_or(PlanError::InvalidSize(size))?;
                self.max_peak = self.max_peak.max(self.peak);
                tracing::debug!(
                    "ArenaAllocator '{}': peak grew {} -> {}",
                    self.config.label,
                    offset,
                    self.peak
                );
                if self.binder.is_stale(self.peak) {
                    tracing::warn!(
                        "ArenaAllocator '{}': peak {} exceeds bound block of {} bytes, next get_ptr re-reserves",
                        self.config.label,
                        self.peak,
                        self.binder.capacity().unwrap_or(0)
                    );
                }
                offset
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        self.used += size;
        self.live.insert(offset, LiveRange { size, generation });

        tracing::trace!(
            "ArenaAllocator '{}': alloc {} bytes at offset {}",
            self.config.label,
            size,
            offset
        );

        Ok(ArenaBlock {
            offset,
            size,
            generation,
        })
    }

    /// Release the range `[offset, offset + size)`
    ///
    /// `offset` must be what a previous `alloc` returned. `size` is compared
    /// after the same rounding `alloc` applies, so any size that rounds to
    /// the granted size is accepted: with 8-byte alignment `free(a, 10)`
    /// releases the range of an `alloc(13)`, while `free(a, 17)` is rejected.
    ///
    /// # Errors
    /// - `InvalidFree` if the pair does not name a live allocation. The
    ///   allocator is left untouched.
    pub fn free(&mut self, offset: usize, size: usize) -> PlanResult<()> {
        let live = self.lookup_live(offset, size)?;
        self.release(offset, live.size);
        Ok(())
    }

    /// Release the range owned by `block`
    pub fn free_block(&mut self, block: ArenaBlock) -> PlanResult<()> {
        let live = self.lookup_live(block.offset, block.size)?;
        if live.generation != block.generation {
            return Err(PlanError::invalid_free(
                block.offset,
                block.size,
                format!(
                    "handle generation {} does not match live generation {}",
                    block.generation, live.generation
                ),
            ));
        }
        self.release(block.offset, live.size);
        Ok(())
    }

    /// Base address of the physical block backing the arena
    ///
    /// The first call reserves `peak` bytes (at least one alignment unit)
    /// from the runtime. Later calls return the same address until the arena
    /// outgrows the block; then the old block is released and a larger one
    /// reserved, without copying its contents.
    ///
    /// # Errors
    /// - `OutOfMemory` if the runtime cannot reserve the block
    pub fn get_ptr(&mut self) -> PlanResult<NonNull<u8>> {
        let required = self.peak.max(self.config.alignment);
        self.binder.bind(required)
    }

    /// Diagnostic dump of accounting and free-block layout
    pub fn info(&self) -> ArenaInfo {
        ArenaInfo {
            label: self.config.label.clone(),
            stats: self.stats(),
            layout: self.free_list.iter().collect(),
        }
    }

    /// Emit [`info`](Self::info) through `tracing`
    pub fn log_info(&self) {
        tracing::info!("{}", self.info());
    }

    /// Accounting summary
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            peak: self.peak,
            max_peak: self.max_peak,
            used: self.used,
            free_bytes: self.free_list.total_bytes(),
            free_blocks: self.free_list.len(),
            largest_free_block: self.free_list.largest(),
            live_allocations: self.live.len(),
            bound_capacity: self.binder.capacity(),
            alignment: self.config.alignment,
        }
    }

    /// Current high-water mark
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Highest peak over the allocator's lifetime
    pub fn max_peak(&self) -> usize {
        self.max_peak
    }

    /// Bytes held by live allocations
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn alignment(&self) -> usize {
        self.config.alignment
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Number of live allocations
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live allocations as `(offset, size)` in offset order
    pub fn live_ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.live.iter().map(|(&offset, range)| (offset, range.size))
    }

    /// Free blocks in offset order
    pub fn free_blocks(&self) -> impl Iterator<Item = FreeBlock> + '_ {
        self.free_list.iter()
    }

    /// Capacity of the bound block, `None` before the first `get_ptr`
    pub fn bound_capacity(&self) -> Option<usize> {
        self.binder.capacity()
    }

    /// Number of physical reservations so far; changes when the base moves
    pub fn bind_epoch(&self) -> u64 {
        self.binder.epoch()
    }

    /// True when the arena has outgrown the bound block
    pub fn is_binding_stale(&self) -> bool {
        self.binder.is_stale(self.peak)
    }

    /// Runtime backing this allocator
    pub fn runtime(&self) -> &Arc<R> {
        self.binder.runtime()
    }

    /// Round `size` up to the alignment
    ///
    /// # Errors
    /// - `InvalidSize` on overflow
    pub fn aligned_size(&self, size: usize) -> PlanResult<usize> {
        let mask = self.config.alignment - 1;
        size.checked_add(mask)
            .map(|padded| padded & !mask)
            .ok_or(PlanError::InvalidSize(size))
    }

    fn lookup_live(&self, offset: usize, size: usize) -> PlanResult<LiveRange> {
        if size == 0 {
            return Err(PlanError::invalid_free(offset, size, "size cannot be zero"));
        }
        let aligned = self
            .aligned_size(size)
            .map_err(|_| PlanError::invalid_free(offset, size, "size overflows alignment"))?;

        let Some(&live) = self.live.get(&offset) else {
            let reason = if offset >= self.peak || self.free_list.overlaps(offset, aligned) {
                "range is not allocated (double free?)"
            } else {
                "offset is not the start of a live allocation"
            };
            return Err(PlanError::invalid_free(offset, size, reason));
        };

        if live.size != aligned {
            return Err(PlanError::invalid_free(
                offset,
                size,
                format!("allocated as {} bytes", live.size),
            ));
        }
        Ok(live)
    }

    fn release(&mut self, offset: usize, size: usize) {
        self.live.remove(&offset);
        self.used -= size;

        tracing::trace!(
            "ArenaAllocator '{}': free {} bytes at offset {}",
            self.config.label,
            size,
            offset
        );

        if offset + size == self.peak {
            self.set_peak(offset);
        } else {
            let merged = self
                .free_list
                .insert_coalesced(FreeBlock::new(offset, size));
            if merged.end() == self.peak {
                self.free_list.remove(merged.offset);
                self.set_peak(merged.offset);
            }
        }
    }

    /// Shrink `peak` to `new_peak`, then absorb any free block that now
    /// touches the tail
    fn set_peak(&mut self, new_peak: usize) {
        let old_peak = self.peak;
        self.peak = new_peak;
        while let Some(block) = self.free_list.ending_at(self.peak) {
            self.free_list.remove(block.offset);
            self.peak = block.offset;
        }
        tracing::debug!(
            "ArenaAllocator '{}': peak shrank {} -> {}",
            self.config.label,
            old_peak,
            self.peak
        );
    }
}

impl<R: MemoryRuntime> fmt::Debug for ArenaAllocator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("label", &self.config.label)
            .field("alignment", &self.config.alignment)
            .field("peak", &self.peak)
            .field("used", &self.used)
            .field("free_blocks", &self.free_list.len())
            .field("live", &self.live.len())
            .field("binder", &self.binder)
            .finish()
    }
}
