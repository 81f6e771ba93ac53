//! An [`Allocator`] backend served from a bump [`crate::arena::Arena`].

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::Mutex;

use super::{Allocator, AllocatorStats};
use crate::arena::Arena;
use crate::error::GPResult;

struct Inner {
    arena: Arena,
    live: HashSet<usize>,
    stats: AllocatorStats,
}

/// Wraps an [`Arena`] behind a mutex so it can be exposed through the
/// `&self`-based [`Allocator`] trait. Individual `deallocate` calls are a
/// no-op against the arena itself (bump allocators only free in bulk);
/// `reset` is the only way to reclaim space.
#[derive(Debug)]
pub struct ArenaAllocator {
    inner: Mutex<Inner>,
    tracking: bool,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("used", &self.arena.used())
            .field("capacity", &self.arena.capacity())
            .field("live", &self.live.len())
            .finish()
    }
}

impl ArenaAllocator {
    pub fn new(arena: Arena, tracking: bool) -> Self {
        ArenaAllocator {
            inner: Mutex::new(Inner {
                arena,
                live: HashSet::new(),
                stats: AllocatorStats::default(),
            }),
            tracking,
        }
    }

    /// Reset the inner arena (reclaims all space) and clear the tracked
    /// live set. Cumulative counters survive unless [`Allocator::reset_stats`]
    /// is called separately.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.arena.reset();
        inner.live.clear();
        if self.tracking {
            inner.stats.live_allocations = 0;
            inner.stats.live_bytes = 0;
        }
    }

    /// Snapshot of the inner arena's own bump-allocator stats.
    pub fn arena_used(&self) -> usize {
        self.inner.lock().unwrap().arena.used()
    }
}

impl Allocator for ArenaAllocator {
    fn allocate_aligned(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let ptr = inner.arena.allocate(size, alignment)?;
        inner.live.insert(ptr.as_ptr() as usize);
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
        let was_live = inner.live.remove(&(ptr.as_ptr() as usize));
        if self.tracking && was_live {
            inner.stats.frees += 1;
            inner.stats.live_allocations = inner.stats.live_allocations.saturating_sub(1);
            // Individual byte sizes aren't tracked per-pointer here (the
            // arena itself has no per-allocation size table); `live_bytes`
            // is only authoritative after a `reset`.
        }
    }

    fn reallocate(&self, _ptr: Option<NonNull<u8>>, _new_size: usize) -> GPResult<Option<NonNull<u8>>> {
        Err(crate::error::GPError::not_implemented(
            "ArenaAllocator does not support reallocation; allocate a new block instead",
        ))
    }

    fn alignment(&self) -> usize {
        self.inner.lock().unwrap().arena.base_alignment()
    }

    fn owns(&self, ptr: NonNull<u8>) -> bool {
        self.inner.lock().unwrap().arena.owns(ptr)
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
