//! Owned or borrowed raw memory, with alignment tracking and optional
//! canary guards for out-of-bounds-write detection.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::alloc::Allocator;

/// Fixed 4-byte marker written before and after the user region when
/// `use_canary` is set.
const CANARY_MARKER: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
const CANARY_WIDTH: usize = 4;

/// Raw memory, optionally allocator-backed, optionally canary-guarded.
///
/// `base_ptr` is the start of the allocation actually made; `data_ptr` is
/// where the user's bytes begin (`base_ptr + 4` when canaries are enabled,
/// `base_ptr` otherwise). `owns` controls whether `Drop` releases anything.
/// The allocator (if any) is held as an `Arc` rather than a borrow so a
/// `Buffer` never outlives the backend it was served from while still
/// letting `Tensor`/`Value`/`Graph` stay lifetime-parameter-free.
#[derive(Debug)]
pub struct Buffer {
    base_ptr: Option<NonNull<u8>>,
    data_ptr: Option<NonNull<u8>>,
    size: usize,
    alignment: usize,
    owns: bool,
    use_canary: bool,
    allocator: Option<Arc<dyn Allocator>>,
    /// Layout actually allocated, needed to free via `std::alloc` when no
    /// allocator backend was supplied.
    std_layout: Option<Layout>,
}

// SAFETY: Buffer's raw pointers point at exclusively-owned or
// caller-managed memory; there is no shared mutable aliasing introduced by
// sending a Buffer across threads.
unsafe impl Send for Buffer {}

impl Buffer {
    /// Allocate `size` bytes aligned to `alignment` (0 = default). If
    /// `allocator` is `Some`, allocation is served from it; otherwise this
    /// falls back to the platform aligned allocator. Returns `None` if the
    /// underlying allocation fails.
    pub fn allocate(
        size: usize,
        alignment: usize,
        allocator: Option<Arc<dyn Allocator>>,
        use_canary: bool,
    ) -> Option<Self> {
        let guard = if use_canary { 2 * CANARY_WIDTH } else { 0 };
        let total = size.checked_add(guard)?;

        let (base_ptr, std_layout) = match &allocator {
            Some(alloc_ref) => {
                let ptr = alloc_ref.allocate_aligned(total, alignment)?;
                (ptr, None)
            }
            None => {
                if total == 0 {
                    return None;
                }
                let align = if alignment == 0 { std::mem::size_of::<usize>() } else { alignment };
                if !align.is_power_of_two() {
                    tracing::debug!(alignment = align, "Buffer::allocate: alignment is not a power of two");
                    return None;
                }
                let layout = Layout::from_size_align(total, align).ok()?;
                // SAFETY: layout has non-zero size (checked above).
                let raw = unsafe { alloc::alloc(layout) };
                let ptr = NonNull::new(raw)?;
                (ptr, Some(layout))
            }
        };

        let data_ptr = if use_canary {
            // SAFETY: base_ptr has `total = size + 8` bytes; offsetting by 4
            // stays within that allocation.
            unsafe { NonNull::new_unchecked(base_ptr.as_ptr().add(CANARY_WIDTH)) }
        } else {
            base_ptr
        };

        if use_canary {
            // SAFETY: base_ptr/data_ptr regions above are within the
            // allocation; the suffix marker sits at data_ptr + size, which
            // is exactly the last 4 bytes of `total`.
            unsafe {
                std::ptr::copy_nonoverlapping(CANARY_MARKER.as_ptr(), base_ptr.as_ptr(), CANARY_WIDTH);
                std::ptr::copy_nonoverlapping(
                    CANARY_MARKER.as_ptr(),
                    data_ptr.as_ptr().add(size),
                    CANARY_WIDTH,
                );
            }
        }

        Some(Buffer {
            base_ptr: Some(base_ptr),
            data_ptr: Some(data_ptr),
            size,
            alignment,
            owns: true,
            use_canary,
            allocator,
            std_layout,
        })
    }

    /// Wrap externally-owned memory without taking ownership of it. The
    /// resulting `Buffer` never deallocates.
    pub fn borrowed(data_ptr: NonNull<u8>, size: usize, alignment: usize) -> Self {
        Buffer {
            base_ptr: Some(data_ptr),
            data_ptr: Some(data_ptr),
            size,
            alignment,
            owns: false,
            use_canary: false,
            allocator: None,
            std_layout: None,
        }
    }

    /// An empty, non-owning buffer (used for moved-from sources and
    /// zero-size tensors).
    pub fn empty() -> Self {
        Buffer {
            base_ptr: None,
            data_ptr: None,
            size: 0,
            alignment: 0,
            owns: false,
            use_canary: false,
            allocator: None,
            std_layout: None,
        }
    }

    pub fn data_ptr(&self) -> Option<NonNull<u8>> {
        self.data_ptr
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn owns(&self) -> bool {
        self.owns
    }

    pub fn use_canary(&self) -> bool {
        self.use_canary
    }

    /// True if canaries are disabled, or both guard words still hold the
    /// fixed marker. Does not abort on failure — callers decide.
    pub fn validate_canary(&self) -> bool {
        if !self.use_canary {
            return true;
        }
        let (Some(base), Some(data)) = (self.base_ptr, self.data_ptr) else {
            return true;
        };
        // SAFETY: both regions were written by `allocate` and remain valid
        // as long as `owns` (or a borrow) keeps the allocation alive.
        unsafe {
            let prefix = std::slice::from_raw_parts(base.as_ptr(), CANARY_WIDTH);
            let suffix = std::slice::from_raw_parts(data.as_ptr().add(self.size), CANARY_WIDTH);
            prefix == CANARY_MARKER && suffix == CANARY_MARKER
        }
    }

    /// Release the backing memory if `owns`. Safe to call more than once
    /// (idempotent — subsequent calls are no-ops because `owns` is cleared
    /// after the first).
    pub fn deallocate(&mut self) {
        if !self.owns {
            return;
        }
        if let Some(base) = self.base_ptr {
            if self.use_canary {
                let total = self.size + 2 * CANARY_WIDTH;
                // SAFETY: `total` bytes starting at `base` belong to this
                // allocation.
                unsafe { std::ptr::write_bytes(base.as_ptr(), 0, total) };
            }
            match &self.allocator {
                Some(alloc_ref) => alloc_ref.deallocate(Some(base)),
                None => {
                    if let Some(layout) = self.std_layout {
                        // SAFETY: layout is exactly what `alloc::alloc` was
                        // called with for this pointer.
                        unsafe { alloc::dealloc(base.as_ptr(), layout) };
                    }
                }
            }
        }
        self.owns = false;
        self.base_ptr = None;
        self.data_ptr = None;
    }

    /// Deep-copy this buffer's contents into a freshly allocated, owning
    /// buffer using the same allocator (if any) and canary setting.
    pub fn deep_clone(&self) -> Option<Buffer> {
        let mut copy = Buffer::allocate(self.size, self.alignment.max(1), self.allocator.clone(), self.use_canary)?;
        if let (Some(src), Some(dst)) = (self.data_ptr, copy.data_ptr) {
            // SAFETY: both regions are at least `self.size` bytes and
            // non-overlapping (freshly allocated destination).
            unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), self.size) };
        }
        Some(copy)
    }

    /// Transfer ownership out of `self`, leaving it an empty, non-owning
    /// buffer behind (mirrors C++ move semantics).
    pub fn take(&mut self) -> Buffer {
        let moved = Buffer {
            base_ptr: self.base_ptr,
            data_ptr: self.data_ptr,
            size: self.size,
            alignment: self.alignment,
            owns: self.owns,
            use_canary: self.use_canary,
            allocator: self.allocator.clone(),
            std_layout: self.std_layout,
        };
        self.owns = false;
        self.base_ptr = None;
        self.data_ptr = None;
        self.size = 0;
        moved
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.deallocate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::SystemAllocator;

    #[test]
    fn plain_allocation_round_trips() {
        let buf = Buffer::allocate(64, 8, None, false).expect("allocation should succeed");
        assert_eq!(buf.size(), 64);
        assert!(buf.owns());
        assert!(buf.validate_canary());
    }

    #[test]
    fn canary_guards_detect_overflow() {
        let mut buf = Buffer::allocate(16, 8, None, true).expect("allocation should succeed");
        assert!(buf.validate_canary());
        // SAFETY: writing one byte past the user region, inside the
        // allocated suffix guard, for the purpose of this test.
        unsafe {
            *buf.data_ptr().unwrap().as_ptr().add(16) = 0xFF;
        }
        assert!(!buf.validate_canary());
        // Repair it so Drop's own canary wipe doesn't matter either way.
        buf.deallocate();
    }

    #[test]
    fn deallocate_is_idempotent_and_clears_owns() {
        let mut buf = Buffer::allocate(32, 8, None, false).unwrap();
        buf.deallocate();
        assert!(!buf.owns());
        buf.deallocate();
    }

    #[test]
    fn borrowed_buffer_never_deallocates() {
        let mut owner = Buffer::allocate(8, 8, None, false).unwrap();
        let ptr = owner.data_ptr().unwrap();
        let mut borrowed = Buffer::borrowed(ptr, 8, 8);
        assert!(!borrowed.owns());
        borrowed.deallocate();
        assert!(owner.validate_canary());
        owner.deallocate();
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut buf = Buffer::allocate(16, 8, None, false).unwrap();
        let moved = buf.take();
        assert!(!buf.owns());
        assert!(buf.data_ptr().is_none());
        assert!(moved.owns());
        assert_eq!(moved.size(), 16);
    }

    #[test]
    fn deep_clone_copies_bytes() {
        let buf = Buffer::allocate(8, 8, None, false).unwrap();
        // SAFETY: writing within the 8-byte user region just allocated.
        unsafe {
            std::ptr::write_bytes(buf.data_ptr().unwrap().as_ptr(), 7, 8);
        }
        let clone = buf.deep_clone().unwrap();
        // SAFETY: both regions are exactly 8 bytes, freshly allocated.
        let bytes = unsafe { std::slice::from_raw_parts(clone.data_ptr().unwrap().as_ptr(), 8) };
        assert_eq!(bytes, &[7u8; 8]);
    }

    #[test]
    fn allocator_backed_allocation_routes_through_allocator() {
        let allocator: Arc<dyn Allocator> = Arc::new(SystemAllocator::tracked());
        let buf = Buffer::allocate(32, 8, Some(allocator.clone()), false).unwrap();
        assert_eq!(allocator.stats().live_allocations, 1);
        drop(buf);
        assert_eq!(allocator.stats().live_allocations, 0);
    }

    #[test]
    fn zero_size_without_canary_and_without_allocator_fails() {
        assert!(Buffer::allocate(0, 8, None, false).is_none());
    }
}
