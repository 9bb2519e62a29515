//! Native CPU runtime backed by the global heap

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{MemoryRuntime, RuntimeError, RuntimeResult};

/// Host memory runtime
///
/// Every reservation is a zeroed heap block aligned to `base_alignment`.
/// Live reservations are tracked by address so a release of an unknown
/// pointer is reported and ignored instead of handed to the heap.
///
/// # Thread Safety
///
/// `HostRuntime` is `Send + Sync`; one instance may back several
/// allocators through an `Arc`.
#[derive(Debug)]
pub struct HostRuntime {
    base_alignment: usize,
    limit: Option<usize>,
    /// Live reservations: address -> bytes
    live: Mutex<HashMap<usize, usize>>,
    reserve_count: AtomicUsize,
    release_count: AtomicUsize,
}

impl HostRuntime {
    /// Base alignment of every reservation (cache line)
    pub const DEFAULT_BASE_ALIGNMENT: usize = 64;

    /// Create an unbounded host runtime
    pub fn new() -> Self {
        Self {
            base_alignment: Self::DEFAULT_BASE_ALIGNMENT,
            limit: None,
            live: Mutex::new(HashMap::new()),
            reserve_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
        }
    }

    /// Create a host runtime that refuses to hold more than `limit` bytes
    /// at once
    pub fn with_limit(limit: usize) -> Self {
        let mut runtime = Self::new();
        runtime.limit = Some(limit);
        runtime
    }

    /// Total bytes currently reserved
    pub fn reserved_bytes(&self) -> usize {
        self.lock_live().values().sum()
    }

    /// Number of reservations currently held
    pub fn live_reservations(&self) -> usize {
        self.lock_live().len()
    }

    /// Number of successful `reserve` calls so far
    pub fn reserve_count(&self) -> usize {
        self.reserve_count.load(Ordering::Relaxed)
    }

    /// Number of successful `release` calls so far
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::Relaxed)
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, HashMap<usize, usize>> {
        // The map holds plain integers, a poisoned guard is still consistent.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn layout(&self, bytes: usize) -> RuntimeResult<Layout> {
        Layout::from_size_align(bytes, self.base_alignment)
            .map_err(|e| RuntimeError::InvalidLayout(format!("{} bytes: {}", bytes, e)))
    }
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuntime for HostRuntime {
    fn name(&self) -> &str {
        "host"
    }

    fn reserve(&self, bytes: usize) -> RuntimeResult<NonNull<u8>> {
        if bytes == 0 {
            return Err(RuntimeError::InvalidLayout(
                "zero-size reservation".to_string(),
            ));
        }

        let mut live = self.lock_live();

        if let Some(limit) = self.limit {
            let held: usize = live.values().sum();
            let available = limit.saturating_sub(held);
            if bytes > available {
                tracing::error!(
                    "HostRuntime::reserve: {} bytes requested, {} of {} available",
                    bytes,
                    available,
                    limit
                );
                return Err(RuntimeError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
        }

        let layout = self.layout(bytes)?;
        // SAFETY: layout has non-zero size, checked above.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(RuntimeError::OutOfMemory {
            requested: bytes,
            available: 0,
        })?;

        live.insert(ptr.as_ptr() as usize, bytes);
        self.reserve_count.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            "HostRuntime::reserve: {} bytes at {:?}",
            bytes,
            ptr.as_ptr()
        );
        Ok(ptr)
    }

    fn release(&self, ptr: NonNull<u8>, bytes: usize) {
        let addr = ptr.as_ptr() as usize;
        let Some(recorded) = self.lock_live().remove(&addr) else {
            tracing::error!(
                "HostRuntime::release: pointer {:?} was not reserved by this runtime",
                ptr.as_ptr()
            );
            return;
        };

        if recorded != bytes {
            tracing::warn!(
                "HostRuntime::release: {:?} reserved as {} bytes, released as {}",
                ptr.as_ptr(),
                recorded,
                bytes
            );
        }

        match self.layout(recorded) {
            Ok(layout) => {
                // SAFETY: ptr came from alloc_zeroed with exactly this layout
                // and was just removed from the live map, so it is freed once.
                unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
                self.release_count.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("HostRuntime::release: {} bytes at {:?}", recorded, ptr.as_ptr());
            }
            Err(e) => tracing::error!("HostRuntime::release: {}", e),
        }
    }
}

impl Drop for HostRuntime {
    fn drop(&mut self) {
        let live = std::mem::take(&mut *self.lock_live());
        for (addr, bytes) in live {
            tracing::warn!("HostRuntime dropped with {} bytes still reserved at 0x{:x}", bytes, addr);
            if let Ok(layout) = self.layout(bytes) {
                // SAFETY: every key of the live map is a pointer returned by
                // alloc_zeroed with this layout and not yet released.
                unsafe { alloc::dealloc(addr as *mut u8, layout) };
            }
        }
    }
}
