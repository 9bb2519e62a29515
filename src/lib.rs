//! planforge - memory planning for tensor compute graphs
//!
//! Assigns byte offsets inside one shared arena to the tensor buffers a
//! compute graph requests, reclaims them when buffers die, and lazily binds
//! the arena to a single physical block sized to its peak footprint.
//!
//! ```rust
//! use std::sync::Arc;
//! use planforge::{ArenaAllocator, HostRuntime};
//!
//! let mut arena = ArenaAllocator::new(Arc::new(HostRuntime::new()));
//! let a = arena.alloc(48)?;
//! let b = arena.alloc(48)?;
//! let c = arena.alloc(48)?;
//! arena.free(c, 48)?;
//! // Freed tail shrinks the arena, so a larger buffer lands at c's offset
//! assert_eq!(arena.alloc(96)?, c);
//! assert_eq!(arena.peak(), 192);
//! # let _ = (a, b);
//! # Ok::<(), planforge::PlanError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod tensor;
pub mod trace;

pub use backend::{HostRuntime, MemoryRuntime, RuntimeError};
pub use config::AllocatorConfig;
pub use error::{ErrorCategory, PlanError, PlanResult};
pub use memory::{ArenaAllocator, ArenaBlock, ArenaInfo, ArenaStats, FreeBlock};
pub use tensor::{DataType, TensorDesc};
pub use trace::{Trace, TraceReport};
