//! Bit-per-page physical allocator.
//!
//! One bit tracks each managed page: 0 = free, 1 = allocated. The bitmap
//! itself is carved out of the head of the managed region, so the allocator
//! needs no memory of its own. Allocation is a first-fit scan for a run of
//! clear bits — simplicity over fragmentation control.
//!
//! # Failure policy
//!
//! The allocator has no recoverable error path. Exhaustion, zero-length
//! requests, unaligned frees, out-of-range frees, and double frees all
//! panic: every one of them means either a kernel logic bug or a machine
//! that genuinely cannot continue. Callers with an ordinary bounded
//! resource (process slots) must check that bound before allocating, so
//! that reaching the allocator's failure path really is extraordinary.

use meson_core::addr::{PAGE_SIZE, PhysAddr};
use meson_core::kdebug;

use crate::window::PhysWindow;

/// First-fit physical page allocator over a fixed RAM region.
pub struct PageAllocator {
    window: PhysWindow,
    /// Physical address of the bitmap (the head of the window).
    bitmap: PhysAddr,
    /// First page available for allocation, just past the bitmap.
    managed_base: PhysAddr,
    /// Number of pages the bitmap tracks.
    managed_pages: u32,
}

impl PageAllocator {
    /// Creates an allocator over the RAM described by `window`.
    ///
    /// The bitmap is placed at the start of the window and zeroed; the
    /// remainder becomes the managed page pool. Panics if the window is too
    /// small to hold its own bitmap plus at least one page.
    pub fn new(window: PhysWindow) -> Self {
        let total_pages = window.size() / PAGE_SIZE;
        assert!(total_pages > 0, "no allocatable pages");

        let bitmap_bytes = total_pages.div_ceil(8);
        let bitmap_pages = bitmap_bytes.div_ceil(PAGE_SIZE);
        assert!(bitmap_pages < total_pages, "bitmap larger than free RAM");

        window.fill_zero(window.base(), bitmap_pages * PAGE_SIZE);

        let managed_pages = total_pages - bitmap_pages;
        kdebug!(
            "pmm: {} pages managed, bitmap in {} page(s)",
            managed_pages,
            bitmap_pages
        );

        Self {
            window,
            bitmap: window.base(),
            managed_base: window.base() + bitmap_pages * PAGE_SIZE,
            managed_pages,
        }
    }

    fn bit(&self, index: u32) -> bool {
        let byte = self.window.ptr_at(self.bitmap + index / 8);
        // SAFETY: ptr_at bounds-checked the byte; the allocator is the sole
        // writer of the bitmap.
        (unsafe { byte.read() } >> (index % 8)) & 1 != 0
    }

    fn set_bit(&mut self, index: u32) {
        let byte = self.window.ptr_at(self.bitmap + index / 8);
        // SAFETY: see `bit`.
        unsafe { byte.write(byte.read() | 1 << (index % 8)) }
    }

    fn clear_bit(&mut self, index: u32) {
        let byte = self.window.ptr_at(self.bitmap + index / 8);
        // SAFETY: see `bit`.
        unsafe { byte.write(byte.read() & !(1 << (index % 8))) }
    }

    /// Allocates a contiguous run of `n` pages and zero-fills it.
    ///
    /// Panics on exhaustion — out-of-memory is fatal by design, because
    /// every legitimate caller has already checked its own resource bound.
    pub fn alloc_pages(&mut self, n: u32) -> PhysAddr {
        assert!(
            n > 0 && n <= self.managed_pages,
            "invalid allocation of {n} pages"
        );

        let mut run = 0;
        for i in 0..self.managed_pages {
            if self.bit(i) {
                run = 0;
                continue;
            }

            run += 1;
            if run == n {
                let start = i + 1 - n;
                for j in start..=i {
                    self.set_bit(j);
                }
                let paddr = self.managed_base + start * PAGE_SIZE;
                self.window.fill_zero(paddr, n * PAGE_SIZE);
                return paddr;
            }
        }

        panic!("out of physical memory allocating {n} pages");
    }

    /// Releases the `n`-page run starting at `paddr`.
    ///
    /// Panics on any misuse: unaligned base, out-of-range run, or a page
    /// that is not currently allocated. A bad free is never ignored — it
    /// means some other owner's pages would be handed out twice.
    pub fn free_pages(&mut self, paddr: PhysAddr, n: u32) {
        assert!(n > 0, "free of zero pages");
        assert!(paddr.is_aligned(PAGE_SIZE), "unaligned free at {paddr:?}");
        assert!(
            paddr >= self.managed_base,
            "free below managed base: {paddr:?}"
        );

        let start = (paddr - self.managed_base) / PAGE_SIZE;
        assert!(
            start < self.managed_pages && start + n <= self.managed_pages,
            "free out of range: {paddr:?} + {n} pages"
        );

        for i in start..start + n {
            assert!(
                self.bit(i),
                "double free of page {:?}",
                self.managed_base + i * PAGE_SIZE
            );
            self.clear_bit(i);
        }
    }

    /// Returns the allocation state of the page at `index`: 0 free,
    /// 1 allocated, -1 out of range. Backs the `bitmap` debug syscall.
    pub fn page_state(&self, index: i32) -> i32 {
        if index < 0 || index as u32 >= self.managed_pages {
            return -1;
        }
        i32::from(self.bit(index as u32))
    }

    /// Returns the number of managed pages.
    pub fn managed_pages(&self) -> u32 {
        self.managed_pages
    }

    /// Returns how many managed pages are currently allocated.
    pub fn used_pages(&self) -> u32 {
        (0..self.managed_pages).filter(|&i| self.bit(i)).count() as u32
    }

    /// Returns the linear window this allocator manages memory through.
    pub fn window(&self) -> PhysWindow {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::testutil::TestRam;

    fn allocator(pages: u32) -> (TestRam, PageAllocator) {
        let ram = TestRam::new(0x8020_0000, pages);
        let alloc = PageAllocator::new(ram.window());
        (ram, alloc)
    }

    #[test]
    fn alloc_returns_zeroed_aligned_pages() {
        let (ram, mut alloc) = allocator(16);
        let p = alloc.alloc_pages(2);
        assert!(p.is_aligned(PAGE_SIZE));

        let mut bytes = [0xffu8; 64];
        ram.window().read_bytes(p + PAGE_SIZE, &mut bytes);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn alloc_free_round_trip_restores_bitmap() {
        let (_ram, mut alloc) = allocator(16);
        let before = alloc.used_pages();

        let p = alloc.alloc_pages(3);
        assert_eq!(alloc.used_pages(), before + 3);

        alloc.free_pages(p, 3);
        assert_eq!(alloc.used_pages(), before);
    }

    #[test]
    fn first_fit_reuses_freed_run() {
        let (_ram, mut alloc) = allocator(16);
        let a = alloc.alloc_pages(2);
        let _b = alloc.alloc_pages(1);
        alloc.free_pages(a, 2);
        // The freed two-page hole at the front is the first fit again.
        assert_eq!(alloc.alloc_pages(2), a);
    }

    #[test]
    fn runs_skip_over_allocated_pages() {
        let (_ram, mut alloc) = allocator(16);
        let a = alloc.alloc_pages(1);
        let b = alloc.alloc_pages(1);
        alloc.free_pages(a, 1);
        // A two-page run cannot use the single-page hole before `b`.
        let c = alloc.alloc_pages(2);
        assert!(c > b);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_fatal() {
        let (_ram, mut alloc) = allocator(16);
        let p = alloc.alloc_pages(1);
        alloc.free_pages(p, 1);
        alloc.free_pages(p, 1);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn freeing_never_allocated_page_is_fatal() {
        let (_ram, mut alloc) = allocator(16);
        // Nothing was ever allocated; every managed bit is clear.
        alloc.free_pages(alloc.managed_base, 1);
    }

    #[test]
    #[should_panic(expected = "unaligned free")]
    fn unaligned_free_is_fatal() {
        let (_ram, mut alloc) = allocator(16);
        let p = alloc.alloc_pages(1);
        alloc.free_pages(PhysAddr::new(p.as_u32() + 1), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_free_is_fatal() {
        let (_ram, mut alloc) = allocator(16);
        let end = alloc.managed_base + alloc.managed_pages * PAGE_SIZE;
        alloc.free_pages(end, 1);
    }

    #[test]
    #[should_panic(expected = "out of physical memory")]
    fn exhaustion_is_fatal() {
        let (_ram, mut alloc) = allocator(8);
        let n = alloc.managed_pages();
        let _ = alloc.alloc_pages(n);
        let _ = alloc.alloc_pages(1);
    }

    #[test]
    fn page_state_reports_bitmap() {
        let (_ram, mut alloc) = allocator(8);
        let p = alloc.alloc_pages(1);
        let index = ((p - alloc.managed_base) / PAGE_SIZE) as i32;
        assert_eq!(alloc.page_state(index), 1);
        alloc.free_pages(p, 1);
        assert_eq!(alloc.page_state(index), 0);
        assert_eq!(alloc.page_state(-1), -1);
        assert_eq!(alloc.page_state(alloc.managed_pages() as i32), -1);
    }
}
