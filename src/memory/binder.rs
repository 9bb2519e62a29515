//! Lazy binding of the arena to one physical block

use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::MemoryRuntime;
use crate::error::PlanResult;

/// Physical block currently backing the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackingBlock {
    ptr: NonNull<u8>,
    capacity: usize,
}

/// Arena binder: caches one backing block and replaces it only when the
/// arena outgrows it
///
/// The binder owns the cached block and releases it exactly once, either
/// when it is replaced or when the binder is dropped.
pub struct ArenaBinder<R: MemoryRuntime> {
    runtime: Arc<R>,
    cached: Option<BackingBlock>,
    /// Number of successful reservations so far
    epoch: u64,
}

impl<R: MemoryRuntime> ArenaBinder<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            cached: None,
            epoch: 0,
        }
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    /// Capacity of the cached block, if bound
    pub fn capacity(&self) -> Option<usize> {
        self.cached.map(|block| block.capacity)
    }

    /// Number of physical reservations made so far
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when a block is cached but smaller than `required`
    pub fn is_stale(&self, required: usize) -> bool {
        self.cached.is_some_and(|block| block.capacity < required)
    }

    /// Return a base pointer valid for at least `required` bytes
    ///
    /// `required` must already be rounded to the arena alignment and be
    /// non-zero. The cached block is reused while it is large enough;
    /// otherwise it is released first and a new one reserved. Contents of
    /// a replaced block are not carried over.
    pub fn bind(&mut self, required: usize) -> PlanResult<NonNull<u8>> {
        if let Some(block) = self.cached {
            if block.capacity >= required {
                return Ok(block.ptr);
            }
            tracing::info!(
                "ArenaBinder: cached block of {} bytes too small for {}, re-reserving",
                block.capacity,
                required
            );
            self.release_cached();
        }

        let ptr = self.runtime.reserve(required).map_err(|e| {
            tracing::error!(
                "ArenaBinder: {} runtime failed to reserve {} bytes: {}",
                self.runtime.name(),
                required,
                e
            );
            e
        })?;

        self.cached = Some(BackingBlock {
            ptr,
            capacity: required,
        });
        self.epoch += 1;

        tracing::info!(
            "ArenaBinder: bound {} bytes on {} runtime at {:?} (epoch {})",
            required,
            self.runtime.name(),
            ptr.as_ptr(),
            self.epoch
        );
        Ok(ptr)
    }

    fn release_cached(&mut self) {
        if let Some(block) = self.cached.take() {
            self.runtime.release(block.ptr, block.capacity);
        }
    }
}

impl<R: MemoryRuntime> Drop for ArenaBinder<R> {
    fn drop(&mut self) {
        self.release_cached();
    }
}

impl<R: MemoryRuntime> std::fmt::Debug for ArenaBinder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBinder")
            .field("runtime", &self.runtime.name())
            .field("capacity", &self.capacity())
            .field("epoch", &self.epoch)
            .finish()
    }
}
