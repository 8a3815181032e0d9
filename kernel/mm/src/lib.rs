//! Memory management for the meson kernel.
//!
//! Three layers, bottom up:
//!
//! - [`window`] — the linear physical-memory window. All physical pages the
//!   kernel touches (the allocator bitmap, page tables, user pages) are
//!   reached through one base-plus-offset translation, carried explicitly so
//!   host tests can point it at an ordinary allocation.
//! - [`pmm`] — the bit-per-page physical allocator. First-fit run
//!   allocation, zero-filled pages, and a strictly fatal misuse policy:
//!   double frees, unaligned frees, and exhaustion all panic.
//! - [`paging`] / [`space`] — Sv32-style two-level page tables (1024
//!   entries per level, 4 KiB pages) and the per-process address space
//!   built on them. Every process owns its root table and every
//!   second-level table reachable from it; nothing is shared.

#![cfg_attr(not(test), no_std)]

pub mod paging;
pub mod pmm;
pub mod space;
pub mod window;

pub use paging::PteFlags;
pub use pmm::PageAllocator;
pub use space::{AddressSpace, MmioWindow, SpaceLayout};
pub use window::PhysWindow;
