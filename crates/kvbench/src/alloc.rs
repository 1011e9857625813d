//! Allocation accounting.
//!
//! [`CountingAlloc`] wraps another global allocator and counts every
//! allocation the process makes. The crate installs it as the
//! `#[global_allocator]` (over mimalloc by default); the driver takes a
//! [`snapshot`] before and after a measurement and reports the difference.

use std::alloc::{GlobalAlloc, Layout};
use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Global allocator wrapper that counts allocations.
pub struct CountingAlloc<A> {
    inner: A,
}

impl<A> CountingAlloc<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[inline]
fn record(size: usize) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    ALLOCATED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
}

// SAFETY: every call is forwarded unchanged to the inner allocator; the
// counters are plain atomics and never allocate.
unsafe impl<A: GlobalAlloc> GlobalAlloc for CountingAlloc<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        self.inner.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        self.inner.alloc_zeroed(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.inner.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record(new_size);
        self.inner.realloc(ptr, layout, new_size)
    }
}

/// Allocation counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    pub allocations: u64,
    pub bytes: u64,
}

impl AllocSnapshot {
    /// Counters accumulated between `earlier` and `self`.
    pub fn since(&self, earlier: &AllocSnapshot) -> AllocSnapshot {
        AllocSnapshot {
            allocations: self.allocations.saturating_sub(earlier.allocations),
            bytes: self.bytes.saturating_sub(earlier.bytes),
        }
    }
}

/// Read the process-wide counters.
pub fn snapshot() -> AllocSnapshot {
    AllocSnapshot {
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        bytes: ALLOCATED_BYTES.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::alloc::System;

    #[test]
    fn test_counts_forwarded_allocations() {
        let alloc = CountingAlloc::new(System);
        let before = snapshot();
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let ptr = alloc.alloc(layout);
            assert!(!ptr.is_null());
            let ptr = alloc.realloc(ptr, layout, 128);
            assert!(!ptr.is_null());
            alloc.dealloc(ptr, Layout::from_size_align(128, 8).unwrap());
        }
        // Concurrent tests allocate through the installed global wrapper too.
        let delta = snapshot().since(&before);
        assert!(delta.allocations >= 2);
        assert!(delta.bytes >= 192);
    }

    #[test]
    fn test_since_saturates() {
        let later = AllocSnapshot { allocations: 1, bytes: 1 };
        let earlier = AllocSnapshot { allocations: 5, bytes: 5 };
        assert_eq!(later.since(&earlier), AllocSnapshot::default());
    }
}
