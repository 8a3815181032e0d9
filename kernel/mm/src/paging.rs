//! Sv32-style two-level page tables.
//!
//! A root table and its second-level tables each hold 1024 word-sized
//! entries; a leaf entry maps one 4 KiB page. Entry layout: the physical
//! page number in bits 10..31 and the permission bits below. Tables live in
//! physical pages and are read and written through the linear window.

use meson_core::addr::{PAGE_SIZE, PhysAddr, VirtAddr};

use crate::pmm::PageAllocator;
use crate::window::PhysWindow;

/// Entries per table level.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Shift between a physical page number and its position in an entry.
const PTE_PPN_SHIFT: u32 = 10;

bitflags::bitflags! {
    /// Page-table entry permission bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        /// Entry is present.
        const VALID = 1 << 0;
        /// Page is readable.
        const READ = 1 << 1;
        /// Page is writable.
        const WRITE = 1 << 2;
        /// Page is executable.
        const EXEC = 1 << 3;
        /// Page is accessible from user mode.
        const USER = 1 << 4;
    }
}

/// One page-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pte(u32);

impl Pte {
    /// The absent entry.
    pub const EMPTY: Self = Self(0);

    /// Builds a leaf entry mapping `paddr` with `flags` (plus VALID).
    pub fn leaf(paddr: PhysAddr, flags: PteFlags) -> Self {
        Self(paddr.ppn() << PTE_PPN_SHIFT | (flags | PteFlags::VALID).bits())
    }

    /// Builds a non-leaf entry pointing at a second-level table.
    pub fn table(table: PhysAddr) -> Self {
        Self(table.ppn() << PTE_PPN_SHIFT | PteFlags::VALID.bits())
    }

    /// Returns `true` if the entry is present.
    pub fn is_valid(self) -> bool {
        self.0 & PteFlags::VALID.bits() != 0
    }

    /// Returns the physical address the entry points at.
    pub fn paddr(self) -> PhysAddr {
        PhysAddr::from_ppn(self.0 >> PTE_PPN_SHIFT)
    }

    /// Returns the permission bits.
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Returns the raw entry word.
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Allocates a zeroed page to serve as a (root or second-level) table.
pub fn alloc_table(alloc: &mut PageAllocator) -> PhysAddr {
    alloc.alloc_pages(1)
}

/// Reads the entry at `index` of the table at `table`.
pub fn entry_at(window: PhysWindow, table: PhysAddr, index: usize) -> Pte {
    debug_assert!(index < ENTRIES_PER_TABLE);
    Pte(window.read_u32(table + (index as u32) * 4))
}

/// Writes the entry at `index` of the table at `table`.
pub fn set_entry(window: PhysWindow, table: PhysAddr, index: usize, pte: Pte) {
    debug_assert!(index < ENTRIES_PER_TABLE);
    window.write_u32(table + (index as u32) * 4, pte.bits());
}

/// Maps the page at `vaddr` to the frame at `paddr` in the table rooted at
/// `root`, lazily allocating the second-level table if absent.
///
/// Both addresses must be page-aligned; a misaligned mapping request is a
/// fatal kernel bug.
pub fn map_page(
    alloc: &mut PageAllocator,
    root: PhysAddr,
    vaddr: VirtAddr,
    paddr: PhysAddr,
    flags: PteFlags,
) {
    assert!(vaddr.is_aligned(PAGE_SIZE), "unaligned vaddr {vaddr:?}");
    assert!(paddr.is_aligned(PAGE_SIZE), "unaligned paddr {paddr:?}");

    let window = alloc.window();
    let top = entry_at(window, root, vaddr.vpn1());
    let second = if top.is_valid() {
        top.paddr()
    } else {
        let table = alloc_table(alloc);
        set_entry(window, root, vaddr.vpn1(), Pte::table(table));
        table
    };

    set_entry(window, second, vaddr.vpn0(), Pte::leaf(paddr, flags));
}

/// Walks the table rooted at `root` and returns the leaf entry for `vaddr`,
/// or `None` if either level is absent.
pub fn lookup(window: PhysWindow, root: PhysAddr, vaddr: VirtAddr) -> Option<Pte> {
    let top = entry_at(window, root, vaddr.vpn1());
    if !top.is_valid() {
        return None;
    }
    let leaf = entry_at(window, top.paddr(), vaddr.vpn0());
    leaf.is_valid().then_some(leaf)
}
