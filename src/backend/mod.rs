//! Memory runtime backends
//!
//! The planner never touches physical memory during `alloc`/`free`. Only the
//! arena binder asks a [`MemoryRuntime`] for one contiguous block sized to the
//! arena's peak, and hands it back when the block is replaced or dropped.

pub mod error;
pub mod host;

pub use error::{RuntimeError, RuntimeResult};
pub use host::HostRuntime;

use std::ptr::NonNull;

/// Device/runtime memory primitive consumed by the arena binder.
///
/// Implementations must return a pointer valid for at least `bytes`
/// contiguous bytes, or fail with [`RuntimeError::OutOfMemory`].
pub trait MemoryRuntime {
    /// Human-readable runtime name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Reserve `bytes` contiguous bytes
    fn reserve(&self, bytes: usize) -> RuntimeResult<NonNull<u8>>;

    /// Return a block previously obtained from [`MemoryRuntime::reserve`]
    ///
    /// `bytes` is the size originally requested for `ptr`.
    fn release(&self, ptr: NonNull<u8>, bytes: usize);
}
