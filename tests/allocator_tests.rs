//! Allocation scenarios for the arena planner

mod common;

use std::sync::Arc;

use common::{assert_arena_invariants, host_arena, large_tensor_bytes, small_tensor_bytes};
use planforge::{AllocatorConfig, ArenaAllocator, FreeBlock, HostRuntime, PlanError};

#[test]
fn test_alloc_reuses_freed_middle_block() {
    let (_runtime, mut arena) = host_arena();
    let bytes = small_tensor_bytes();

    // allocate a -> b -> c
    let offset_a = arena.alloc(bytes).unwrap();
    let offset_b = arena.alloc(bytes).unwrap();
    let offset_c = arena.alloc(bytes).unwrap();
    assert_eq!((offset_a, offset_b, offset_c), (0, 48, 96));

    // free b, then allocate d: expected layout a -> d -> c
    arena.free(offset_b, bytes).unwrap();
    let offset_d = arena.alloc(bytes).unwrap();

    assert_eq!(offset_d, offset_b);
    assert_eq!(arena.peak(), 144);
    assert_arena_invariants(&arena);
}

#[test]
fn test_alloc_with_end_free_block() {
    let (_runtime, mut arena) = host_arena();
    let small = small_tensor_bytes();
    let large = large_tensor_bytes();

    arena.alloc(small).unwrap();
    arena.alloc(small).unwrap();
    let offset_c = arena.alloc(small).unwrap();
    assert_eq!(arena.peak(), 144);

    // free c, then allocate the larger d
    arena.free(offset_c, small).unwrap();
    assert_eq!(arena.peak(), 96);
    let offset_d = arena.alloc(large).unwrap();

    // a -> b -> d, with no free block between b and d
    assert_eq!(offset_d, offset_c);
    assert_eq!(arena.peak(), 192);
    assert_eq!(arena.stats().free_blocks, 0);
    assert_arena_invariants(&arena);
}

#[test]
fn test_round_trip_returns_peak_to_zero() {
    let (_runtime, mut arena) = host_arena();
    let sizes = [48, 96, 8, 1024, 40, 48];
    let offsets: Vec<usize> = sizes.iter().map(|&s| arena.alloc(s).unwrap()).collect();

    // Free in an order that exercises left, right and tail merges
    for idx in [1, 3, 0, 5, 2, 4] {
        arena.free(offsets[idx], sizes[idx]).unwrap();
        assert_arena_invariants(&arena);
    }

    assert_eq!(arena.peak(), 0);
    assert_eq!(arena.used_bytes(), 0);
    assert_eq!(arena.stats().free_blocks, 0);
    assert_eq!(arena.max_peak(), sizes.iter().sum::<usize>());
}

#[test]
fn test_best_fit_ties_break_on_lowest_offset() {
    let (_runtime, mut arena) = host_arena();
    let offsets: Vec<usize> = (0..6).map(|_| arena.alloc(32).unwrap()).collect();

    // Two equal 32-byte holes at offsets[1] and offsets[3]
    arena.free(offsets[3], 32).unwrap();
    arena.free(offsets[1], 32).unwrap();

    assert_eq!(arena.alloc(16).unwrap(), offsets[1]);
    let layout: Vec<FreeBlock> = arena.free_blocks().collect();
    assert_eq!(
        layout,
        vec![
            FreeBlock::new(offsets[1] + 16, 16),
            FreeBlock::new(offsets[3], 32)
        ]
    );

    // The 16-byte remainder is now the tightest fit
    assert_eq!(arena.alloc(16).unwrap(), offsets[1] + 16);
    assert_arena_invariants(&arena);
}

#[test]
fn test_oversized_request_grows_past_holes() {
    let (_runtime, mut arena) = host_arena();
    let a = arena.alloc(64).unwrap();
    let _b = arena.alloc(64).unwrap();
    arena.free(a, 64).unwrap();

    let c = arena.alloc(128).unwrap();
    assert_eq!(c, 128);
    assert_eq!(arena.peak(), 256);
    assert_eq!(arena.stats().free_bytes, 64);
    assert_arena_invariants(&arena);
}

#[test]
fn test_custom_alignment() {
    let runtime = Arc::new(HostRuntime::new());
    let config = AllocatorConfig::new()
        .with_alignment(256)
        .with_label("attention");
    let mut arena = ArenaAllocator::with_config(runtime, config).unwrap();

    assert_eq!(arena.alloc(48).unwrap(), 0);
    assert_eq!(arena.alloc(300).unwrap(), 256);
    assert_eq!(arena.peak(), 768);
    assert_eq!(arena.info().label, "attention");
    assert_arena_invariants(&arena);
}

#[test]
fn test_invalid_config_rejected() {
    let runtime = Arc::new(HostRuntime::new());
    let result = ArenaAllocator::with_config(runtime, AllocatorConfig::new().with_alignment(24));
    assert!(matches!(result, Err(PlanError::InvalidAlignment(24))));
}

#[test]
fn test_invalid_frees_do_not_corrupt_state() {
    let (_runtime, mut arena) = host_arena();
    let a = arena.alloc(48).unwrap();
    let b = arena.alloc(48).unwrap();
    let c = arena.alloc(48).unwrap();
    arena.free(b, 48).unwrap();

    let before = arena.info();
    let attempts = [(b, 48), (a, 96), (a + 8, 40), (c, 16), (c + 48, 48), (a, 0)];
    for (offset, size) in attempts {
        let err = arena.free(offset, size).unwrap_err();
        assert!(err.is_user_error(), "{}", err);
        assert!(matches!(err, PlanError::InvalidFree { .. }));
    }
    assert_eq!(arena.info(), before);
    assert_arena_invariants(&arena);
}

#[test]
fn test_free_size_matches_after_rounding() {
    let (_runtime, mut arena) = host_arena();
    let a = arena.alloc(13).unwrap();
    let b = arena.alloc(8).unwrap();

    // 17 rounds to 24, not the 16 bytes granted
    let err = arena.free(a, 17).unwrap_err();
    assert!(matches!(err, PlanError::InvalidFree { .. }));
    assert_eq!(arena.used_bytes(), 24);

    // 10 rounds to the granted 16
    arena.free(a, 10).unwrap();
    assert_eq!(arena.free_blocks().collect::<Vec<_>>(), vec![FreeBlock::new(0, 16)]);
    arena.free(b, 8).unwrap();
    assert_eq!(arena.peak(), 0);
}

#[test]
fn test_zero_alloc_rejected() {
    let (_runtime, mut arena) = host_arena();
    assert!(matches!(arena.alloc(0), Err(PlanError::InvalidSize(0))));
    assert!(arena.alloc_block(0).is_err());
    assert_eq!(arena.live_count(), 0);
}

#[test]
fn test_handle_api_mirrors_offset_api() {
    let (_runtime, mut arena) = host_arena();
    let a = arena.alloc_block(48).unwrap();
    let b = arena.alloc_block(48).unwrap();
    let c = arena.alloc_block(48).unwrap();
    let b_offset = b.offset();

    arena.free_block(b).unwrap();
    let d = arena.alloc_block(48).unwrap();
    assert_eq!(d.offset(), b_offset);

    for block in [c, d, a] {
        arena.free_block(block).unwrap();
        assert_arena_invariants(&arena);
    }
    assert_eq!(arena.peak(), 0);
}

#[test]
fn test_info_reports_layout() {
    let (_runtime, mut arena) = host_arena();
    let offsets: Vec<usize> = (0..5).map(|_| arena.alloc(48).unwrap()).collect();
    arena.free(offsets[1], 48).unwrap();
    arena.free(offsets[3], 48).unwrap();

    let info = arena.info();
    assert_eq!(info.stats.peak, 240);
    assert_eq!(info.stats.used, 144);
    assert_eq!(info.stats.free_bytes, 96);
    assert_eq!(info.stats.free_blocks, 2);
    assert_eq!(info.stats.live_allocations, 3);
    assert_eq!(
        info.layout,
        vec![FreeBlock::new(48, 48), FreeBlock::new(144, 48)]
    );
    assert!((info.stats.fragmentation() - 0.5).abs() < f32::EPSILON);

    let text = info.to_string();
    assert!(text.contains("peak: 240 bytes"));
    assert!(text.contains("free [48, 96) 48 bytes"));

    // info is a pure read
    assert_eq!(arena.info(), info);
    arena.log_info();
}
