//! Per-process address spaces.
//!
//! Every process owns a root table, every second-level table under it, and
//! every user frame its leaves point at. The kernel image, free RAM, and
//! the device MMIO windows are mapped identically into each space —
//! duplicated, never shared — so supervisor code and drivers behave the
//! same no matter which process is current. User images sit at a fixed
//! virtual base with user-accessible permissions.

use meson_core::addr::{PAGE_SIZE, PhysAddr, VirtAddr};

use crate::paging::{self, ENTRIES_PER_TABLE, Pte, PteFlags};
use crate::pmm::PageAllocator;
use crate::window::PhysWindow;

/// One fixed device MMIO range, mapped read/write into every space.
#[derive(Debug, Clone, Copy)]
pub struct MmioWindow {
    /// Physical (and identity-mapped virtual) base of the range.
    pub base: u32,
    /// Length in pages.
    pub pages: u32,
}

/// The fixed regions every address space contains.
#[derive(Clone, Copy)]
pub struct SpaceLayout<'a> {
    /// Start of the kernel identity mapping.
    pub kernel_base: VirtAddr,
    /// End of the kernel identity mapping (exclusive): top of free RAM.
    pub kernel_end: VirtAddr,
    /// Device windows, identity-mapped read/write.
    pub mmio: &'a [MmioWindow],
    /// Virtual base where user images are loaded.
    pub user_base: VirtAddr,
}

/// A two-level paged address space owned by one process.
pub struct AddressSpace {
    root: PhysAddr,
    user_base: VirtAddr,
    user_pages: u32,
}

impl AddressSpace {
    /// Builds a fresh space containing the kernel and device mappings of
    /// `layout`, with no user pages yet.
    pub fn build(alloc: &mut PageAllocator, layout: &SpaceLayout<'_>) -> Self {
        let root = paging::alloc_table(alloc);

        let mut vaddr = layout.kernel_base;
        while vaddr < layout.kernel_end {
            paging::map_page(
                alloc,
                root,
                vaddr,
                PhysAddr::new(vaddr.as_u32()),
                PteFlags::READ | PteFlags::WRITE | PteFlags::EXEC,
            );
            vaddr = vaddr + PAGE_SIZE;
        }

        for window in layout.mmio {
            for i in 0..window.pages {
                let addr = window.base + i * PAGE_SIZE;
                paging::map_page(
                    alloc,
                    root,
                    VirtAddr::new(addr),
                    PhysAddr::new(addr),
                    PteFlags::READ | PteFlags::WRITE,
                );
            }
        }

        Self {
            root,
            user_base: layout.user_base,
            user_pages: 0,
        }
    }

    /// Copies `image` into freshly allocated frames mapped at the user base
    /// with user read/write/execute permissions.
    pub fn load_image(&mut self, alloc: &mut PageAllocator, image: &[u8]) {
        debug_assert_eq!(self.user_pages, 0, "image loaded over live user pages");

        let window = alloc.window();
        let mut off = 0usize;
        while off < image.len() {
            let frame = alloc.alloc_pages(1);
            let chunk = usize::min(PAGE_SIZE as usize, image.len() - off);
            window.write_bytes(frame, &image[off..off + chunk]);
            paging::map_page(
                alloc,
                self.root,
                self.user_base + off as u32,
                frame,
                PteFlags::USER | PteFlags::READ | PteFlags::WRITE | PteFlags::EXEC,
            );
            off += PAGE_SIZE as usize;
        }

        self.user_pages = (image.len() as u32).div_ceil(PAGE_SIZE);
    }

    /// Eagerly duplicates every mapped user page of `parent` into this
    /// space, preserving the leaf permission bits. Used by fork; there is
    /// no copy-on-write, so the two spaces share nothing afterwards.
    pub fn clone_user_from(&mut self, alloc: &mut PageAllocator, parent: &AddressSpace) {
        debug_assert_eq!(self.user_pages, 0, "clone over live user pages");

        let window = alloc.window();
        for i in 0..parent.user_pages {
            let vaddr = parent.user_base + i * PAGE_SIZE;
            let Some(leaf) = paging::lookup(window, parent.root, vaddr) else {
                continue;
            };
            let frame = alloc.alloc_pages(1);
            window.copy(frame, leaf.paddr(), PAGE_SIZE);
            paging::map_page(alloc, self.root, vaddr, frame, leaf.flags());
        }

        self.user_pages = parent.user_pages;
    }

    /// Returns the leaf entry for `vaddr`, if mapped.
    pub fn lookup(&self, window: PhysWindow, vaddr: VirtAddr) -> Option<Pte> {
        paging::lookup(window, self.root, vaddr)
    }

    /// Frees every user frame and clears its leaf entry, leaving the kernel
    /// and device mappings intact. This is the exec path: the old image
    /// goes away, the rest of the space stays valid.
    pub fn free_user_pages(&mut self, alloc: &mut PageAllocator) {
        let window = alloc.window();
        for i in 0..self.user_pages {
            let vaddr = self.user_base + i * PAGE_SIZE;
            let top = paging::entry_at(window, self.root, vaddr.vpn1());
            if !top.is_valid() {
                continue;
            }
            let second = top.paddr();
            let leaf = paging::entry_at(window, second, vaddr.vpn0());
            if !leaf.is_valid() {
                continue;
            }
            alloc.free_pages(leaf.paddr(), 1);
            paging::set_entry(window, second, vaddr.vpn0(), Pte::EMPTY);
        }
        self.user_pages = 0;
    }

    /// Releases everything the space owns: user frames first, then every
    /// second-level table, then the root. Leaf pages go before tables so a
    /// partial walk can never orphan a frame.
    pub fn teardown(mut self, alloc: &mut PageAllocator) {
        self.free_user_pages(alloc);

        let window = alloc.window();
        for index in 0..ENTRIES_PER_TABLE {
            let top = paging::entry_at(window, self.root, index);
            if !top.is_valid() {
                continue;
            }
            alloc.free_pages(top.paddr(), 1);
            paging::set_entry(window, self.root, index, Pte::EMPTY);
        }

        alloc.free_pages(self.root, 1);
    }

    /// Returns the physical address of the root table (the value loaded
    /// into the translation register on context switch).
    pub fn root(&self) -> PhysAddr {
        self.root
    }

    /// Returns the virtual base of the user image.
    pub fn user_base(&self) -> VirtAddr {
        self.user_base
    }

    /// Returns the number of mapped user pages.
    pub fn user_pages(&self) -> u32 {
        self.user_pages
    }
}
