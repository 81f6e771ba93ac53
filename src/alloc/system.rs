//! Allocator backend over the platform's aligned allocator.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;

use super::{Allocator, AllocatorStats};
use crate::error::GPResult;

/// `size_align_layout` keyed by the numeric address of the pointer it
/// describes. Maintained unconditionally (not just when `tracking` is
/// on): Rust's allocator API requires the exact `Layout` an allocation was
/// made with to free or grow it, unlike C's `free(ptr)`, so this map is a
/// soundness requirement rather than an optional feature.
struct Inner {
    sizes: HashMap<usize, Layout>,
    stats: AllocatorStats,
}

/// Allocator backend over `std::alloc`'s aligned allocation.
///
/// The public `tracking` flag gates whether `stats()` reports anything
/// other than zero and whether `owns()` consults the live-allocation set.
/// With tracking disabled, `owns()` returns `true` for any non-null
/// pointer — callers that need a trustworthy ownership check must enable
/// tracking.
#[derive(Debug)]
pub struct SystemAllocator {
    alignment: usize,
    tracking: bool,
    inner: Mutex<Inner>,
}

impl SystemAllocator {
    /// `alignment` is this allocator's default; `tracking` enables the
    /// visible bookkeeping described on the type.
    pub fn new(alignment: usize, tracking: bool) -> Self {
        let alignment = if alignment == 0 { std::mem::size_of::<usize>() } else { alignment };
        SystemAllocator {
            alignment,
            tracking,
            inner: Mutex::new(Inner {
                sizes: HashMap::new(),
                stats: AllocatorStats::default(),
            }),
        }
    }

    /// Untracked system allocator at pointer-size alignment.
    pub fn untracked() -> Self {
        Self::new(std::mem::size_of::<usize>(), false)
    }

    /// Tracked system allocator at pointer-size alignment.
    pub fn tracked() -> Self {
        Self::new(std::mem::size_of::<usize>(), true)
    }
}

impl Allocator for SystemAllocator {
    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let align = if alignment == 0 { self.alignment } else { alignment };
        if !align.is_power_of_two() {
            tracing::debug!(alignment = align, "SystemAllocator: alignment is not a power of two");
            return None;
        }
        let layout = Layout::from_size_align(size, align).ok()?;
        // SAFETY: layout has non-zero size (checked above).
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw)?;

        let mut inner = self.inner.lock().unwrap();
        inner.sizes.insert(ptr.as_ptr() as usize, layout);
        if self.tracking {
            inner.stats.allocations += 1;
            inner.stats.bytes_allocated += size;
            inner.stats.live_allocations += 1;
            inner.stats.live_bytes += size;
            inner.stats.peak_live_bytes = inner.stats.peak_live_bytes.max(inner.stats.live_bytes);
        }
        Some(ptr)
    }

    fn deallocate(&self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else { return };
        let mut inner = self.inner.lock().unwrap();
        let Some(layout) = inner.sizes.remove(&(ptr.as_ptr() as usize)) else {
            tracing::warn!("SystemAllocator::deallocate: pointer not recognized, ignoring");
            return;
        };
        if self.tracking {
            inner.stats.frees += 1;
            inner.stats.bytes_freed += layout.size();
            inner.stats.live_allocations = inner.stats.live_allocations.saturating_sub(1);
            inner.stats.live_bytes = inner.stats.live_bytes.saturating_sub(layout.size());
        }
        drop(inner);
        // SAFETY: layout is the exact layout `ptr` was allocated with.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    fn reallocate(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> GPResult<Option<NonNull<u8>>> {
        let Some(ptr) = ptr else {
            return Ok(self.allocate(new_size));
        };
        let old_layout = {
            let inner = self.inner.lock().unwrap();
            inner.sizes.get(&(ptr.as_ptr() as usize)).copied()
        };
        let Some(old_layout) = old_layout else {
            // Old size cannot be recovered: documented null fallback.
            return Ok(None);
        };
        let Some(new_ptr) = self.allocate_aligned(new_size, old_layout.align()) else {
            return Ok(None);
        };
        let copy_len = old_layout.size().min(new_size);
        // SAFETY: both regions are at least `copy_len` bytes, freshly
        // allocated (new) or about to be freed (old), and non-overlapping.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), copy_len);
        }
        self.deallocate(Some(ptr));
        Ok(Some(new_ptr))
    }

    fn alignment(&self) -> usize {
        self.alignment
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        if !self.tracking {
            return true;
        }
        self.inner.lock().unwrap().sizes.contains_key(&(ptr.as_ptr() as usize))
    }

    fn tracking_enabled(&self) -> bool {
        self.tracking
    }

    fn stats(&self) -> AllocatorStats {
        self.inner.lock().unwrap().stats
    }

    fn reset_stats(&self) {
        let mut inner = self.inner.lock().unwrap();
        let live_allocations = inner.stats.live_allocations;
        let live_bytes = inner.stats.live_bytes;
        inner.stats = AllocatorStats {
            live_allocations,
            live_bytes,
            peak_live_bytes: live_bytes,
            ..AllocatorStats::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_allocate_deallocate_round_trip() {
        let a = SystemAllocator::untracked();
        let p = a.allocate(64).expect("allocation should succeed");
        assert_eq!(a.stats(), AllocatorStats::default());
        a.deallocate(Some(p));
    }

    #[test]
    fn untracked_owns_is_permissive() {
        let a = SystemAllocator::untracked();
        let p = a.allocate(16).unwrap();
        assert!(a.owns(p));
        a.deallocate(Some(p));
        // Still reports true for any non-null pointer per the documented
        // untracked-mode hazard, even after it has been freed.
        assert!(a.owns(p));
    }

    #[test]
    fn tracked_owns_reflects_live_set() {
        let a = SystemAllocator::tracked();
        let p = a.allocate(16).unwrap();
        assert!(a.owns(p));
        a.deallocate(Some(p));
        assert!(!a.owns(p));
    }

    #[test]
    fn tracked_stats_balance_after_matched_calls() {
        let a = SystemAllocator::tracked();
        let pointers: Vec<_> = (0..8).map(|i| a.allocate(8 * (i + 1)).unwrap()).collect();
        assert_eq!(a.stats().live_allocations, 8);
        for p in pointers {
            a.deallocate(Some(p));
        }
        let stats = a.stats();
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.allocations, 8);
        assert_eq!(stats.frees, 8);
    }

    #[test]
    fn zero_size_allocation_returns_none() {
        let a = SystemAllocator::untracked();
        assert!(a.allocate(0).is_none());
    }

    #[test]
    fn non_power_of_two_alignment_returns_none() {
        let a = SystemAllocator::untracked();
        assert!(a.allocate_aligned(16, 3).is_none());
    }

    #[test]
    fn deallocate_none_is_a_no_op() {
        let a = SystemAllocator::untracked();
        a.deallocate(None);
    }

    #[test]
    fn reallocate_preserves_prefix_bytes() {
        let a = SystemAllocator::untracked();
        let p = a.allocate(4).unwrap();
        unsafe {
            std::ptr::write_bytes(p.as_ptr(), 0xAB, 4);
        }
        let grown = a.reallocate(Some(p), 16).unwrap().expect("grow should succeed");
        let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 4) };
        assert_eq!(bytes, &[0xAB; 4]);
        a.deallocate(Some(grown));
    }

    #[test]
    fn reallocate_from_none_behaves_like_allocate() {
        let a = SystemAllocator::untracked();
        let p = a.reallocate(None, 32).unwrap();
        assert!(p.is_some());
        a.deallocate(p);
    }

    #[test]
    fn reset_stats_clears_cumulative_but_not_live() {
        let a = SystemAllocator::tracked();
        let p = a.allocate(8).unwrap();
        a.reset_stats();
        let stats = a.stats();
        assert_eq!(stats.allocations, 0);
        assert_eq!(stats.live_allocations, 1);
        assert_eq!(stats.live_bytes, 8);
        a.deallocate(Some(p));
    }
}
