//! Shared fixtures for planner integration tests
//!
//! - Runtimes with scripted behaviour (always failing)
//! - Tensor sizes used across scenarios
//! - A full invariant check over an allocator's observable state

#![allow(dead_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use planforge::{ArenaAllocator, DataType, HostRuntime, MemoryRuntime, RuntimeError, TensorDesc};

pub use serial_test::serial;

/// [1, 2, 2, 3] f32: 48 bytes
pub fn small_tensor_bytes() -> usize {
    TensorDesc::new(&[1, 2, 2, 3], DataType::Float32)
        .bytes()
        .unwrap()
}

/// [2, 2, 2, 3] f32: 96 bytes
pub fn large_tensor_bytes() -> usize {
    TensorDesc::new(&[2, 2, 2, 3], DataType::Float32)
        .bytes()
        .unwrap()
}

/// Allocator over a fresh host runtime
pub fn host_arena() -> (Arc<HostRuntime>, ArenaAllocator<HostRuntime>) {
    let runtime = Arc::new(HostRuntime::new());
    let arena = ArenaAllocator::new(Arc::clone(&runtime));
    (runtime, arena)
}

/// Runtime that refuses every reservation
#[derive(Debug, Default)]
pub struct FailingRuntime {
    pub attempts: AtomicUsize,
}

impl MemoryRuntime for FailingRuntime {
    fn name(&self) -> &str {
        "failing"
    }

    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>, RuntimeError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(RuntimeError::OutOfMemory {
            requested: bytes,
            available: 0,
        })
    }

    fn release(&self, _ptr: NonNull<u8>, _bytes: usize) {
        panic!("FailingRuntime never hands out memory");
    }
}

/// Check every structural invariant of the arena
///
/// - live ranges and free blocks tile `[0, peak)` with no overlap
/// - no two free blocks are adjacent, none touches the tail
/// - peak equals the end of the highest live range
/// - sizes and peak respect the alignment
pub fn assert_arena_invariants<R: MemoryRuntime>(arena: &ArenaAllocator<R>) {
    let align = arena.alignment();
    let mut ranges: Vec<(usize, usize, bool)> = arena
        .live_ranges()
        .map(|(offset, size)| (offset, size, true))
        .chain(arena.free_blocks().map(|b| (b.offset, b.size, false)))
        .collect();
    ranges.sort_by_key(|&(offset, _, _)| offset);

    let mut cursor = 0;
    let mut prev_free = false;
    for &(offset, size, is_live) in &ranges {
        assert_eq!(offset, cursor, "gap or overlap at offset {}", cursor);
        assert!(size > 0);
        assert_eq!(size % align, 0, "unaligned range [{}, +{})", offset, size);
        assert!(
            !(prev_free && !is_live),
            "adjacent free blocks meeting at {}",
            offset
        );
        prev_free = !is_live;
        cursor = offset + size;
    }
    assert_eq!(cursor, arena.peak(), "ranges do not cover [0, peak)");
    assert!(!prev_free, "free block touches the tail");

    let live_end = arena
        .live_ranges()
        .map(|(offset, size)| offset + size)
        .max()
        .unwrap_or(0);
    assert_eq!(arena.peak(), live_end, "peak is not minimal");
    assert_eq!(arena.peak() % align, 0);

    let used: usize = arena.live_ranges().map(|(_, size)| size).sum();
    assert_eq!(arena.used_bytes(), used);
    assert_eq!(arena.stats().free_bytes + used, arena.peak());
}
