//! Arena memory planning for tensor buffers
//!
//! A compute graph asks for tensor buffers in execution order and releases
//! them when their last consumer has run. Instead of reserving device memory
//! per tensor, the planner assigns each buffer an offset inside one shared
//! arena and reuses offsets whose tensors are dead.
//!
//! # Pattern
//!
//! 1. `alloc(size)` grants an offset: best-fit reuse of a free block, else
//!    growth at the arena's peak
//! 2. `free(offset, size)` returns the range, coalescing with free neighbours
//!    or shrinking the peak when the range sits at the tail
//! 3. `get_ptr()` binds the arena to one physical block of `peak` bytes;
//!    buffer addresses are `base + offset`

pub mod allocator;
pub mod binder;
pub mod free_list;
pub mod stats;

pub use allocator::{ArenaAllocator, ArenaBlock};
pub use binder::ArenaBinder;
pub use free_list::{FreeBlock, FreeList};
pub use stats::{ArenaInfo, ArenaStats};
