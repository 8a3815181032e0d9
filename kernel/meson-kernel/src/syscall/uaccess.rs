//! User-memory access: pointer validation and the scoped supervisor
//! privilege widening every boundary copy must go through.
//!
//! Supervisor code may not touch user pages unless the status word's SUM
//! bit is set. [`UserAccess`] is that rule as a type: constructing the
//! guard widens access, dropping it narrows access again on every exit
//! path, and the copy routines only exist on the guard — an unbracketed
//! user-memory access cannot be written.
//!
//! Copies translate user virtual addresses page by page through the
//! process's own tables. An unmapped page, a supervisor-only page, or a
//! read-only page on the write path yields a recoverable [`UserFault`],
//! which handlers turn into a negative result.

use core::marker::PhantomData;
use core::mem::{MaybeUninit, align_of, size_of};

use meson_core::addr::{PAGE_SIZE, VirtAddr};
use meson_mm::{AddressSpace, PhysWindow, PteFlags};

use crate::config::KERNEL_BASE;
use crate::trap::StatusFlags;

/// A failed access to user memory. Recoverable: the syscall reports an
/// error, the system continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFault {
    /// Null, misaligned, or kernel-range address.
    BadAddress,
    /// The page is not mapped in the caller's address space.
    NotMapped,
    /// The page is mapped but not user-accessible.
    NotUser,
    /// The page is not writable.
    NotWritable,
}

/// A user-space pointer to a `T`, validated for range and alignment.
///
/// Validation here covers only what can be checked without the page
/// tables — null, alignment, overflow, and the user/kernel boundary. The
/// mapping itself is checked by the copy routines.
#[derive(Debug, Clone, Copy)]
pub struct UserPtr<T> {
    addr: VirtAddr,
    _marker: PhantomData<*const T>,
}

impl<T> UserPtr<T> {
    /// Validates a raw user address.
    pub fn new(addr: u32) -> Result<Self, UserFault> {
        if addr == 0 {
            return Err(UserFault::BadAddress);
        }
        if align_of::<T>() > 1 && addr as usize % align_of::<T>() != 0 {
            return Err(UserFault::BadAddress);
        }
        let end = (addr as u64) + size_of::<T>() as u64;
        if end > u64::from(KERNEL_BASE) {
            return Err(UserFault::BadAddress);
        }
        Ok(Self {
            addr: VirtAddr::new(addr),
            _marker: PhantomData,
        })
    }

    /// Returns the validated address.
    pub fn addr(&self) -> VirtAddr {
        self.addr
    }
}

/// Scoped supervisor access to one process's user memory.
///
/// Widens the SUM bit on construction and narrows it on drop. All
/// user-memory copies are methods of this guard.
pub struct UserAccess<'a> {
    status: &'a mut StatusFlags,
    space: &'a AddressSpace,
    window: PhysWindow,
}

impl<'a> UserAccess<'a> {
    /// Opens a bracketed user-memory access for `space`.
    pub fn enter(status: &'a mut StatusFlags, space: &'a AddressSpace, window: PhysWindow) -> Self {
        debug_assert!(
            !status.contains(StatusFlags::SUM),
            "nested user-memory access bracket"
        );
        status.insert(StatusFlags::SUM);
        Self {
            status,
            space,
            window,
        }
    }

    /// Translates one user virtual address, enforcing the user bit and,
    /// for writes, the write bit.
    fn translate(&self, vaddr: VirtAddr, for_write: bool) -> Result<meson_core::addr::PhysAddr, UserFault> {
        let leaf = self
            .space
            .lookup(self.window, vaddr.align_down(PAGE_SIZE))
            .ok_or(UserFault::NotMapped)?;
        let flags = leaf.flags();
        if !flags.contains(PteFlags::USER) {
            return Err(UserFault::NotUser);
        }
        if for_write && !flags.contains(PteFlags::WRITE) {
            return Err(UserFault::NotWritable);
        }
        Ok(leaf.paddr() + vaddr.page_offset())
    }

    /// Copies `bytes` into user memory at `vaddr`, page by page.
    pub fn copy_out(&mut self, vaddr: VirtAddr, bytes: &[u8]) -> Result<(), UserFault> {
        debug_assert!(self.status.contains(StatusFlags::SUM));
        let mut vaddr = vaddr;
        let mut rest = bytes;
        while !rest.is_empty() {
            let chunk = chunk_within_page(vaddr, rest.len());
            let paddr = self.translate(vaddr, true)?;
            self.window.write_bytes(paddr, &rest[..chunk]);
            rest = &rest[chunk..];
            vaddr = vaddr
                .checked_add(chunk as u32)
                .ok_or(UserFault::BadAddress)?;
        }
        Ok(())
    }

    /// Copies user memory at `vaddr` into `out`, page by page.
    pub fn copy_in(&mut self, vaddr: VirtAddr, out: &mut [u8]) -> Result<(), UserFault> {
        debug_assert!(self.status.contains(StatusFlags::SUM));
        let mut vaddr = vaddr;
        let mut rest: &mut [u8] = out;
        while !rest.is_empty() {
            let chunk = chunk_within_page(vaddr, rest.len());
            let paddr = self.translate(vaddr, false)?;
            let (head, tail) = core::mem::take(&mut rest).split_at_mut(chunk);
            self.window.read_bytes(paddr, head);
            rest = tail;
            vaddr = vaddr
                .checked_add(chunk as u32)
                .ok_or(UserFault::BadAddress)?;
        }
        Ok(())
    }

    /// Copies a fixed-layout record to user memory.
    pub fn write_record<T: Copy>(&mut self, ptr: UserPtr<T>, value: &T) -> Result<(), UserFault> {
        // SAFETY: T is a plain #[repr(C)] boundary record; viewing it as
        // bytes is always valid.
        let bytes =
            unsafe { core::slice::from_raw_parts((value as *const T).cast::<u8>(), size_of::<T>()) };
        self.copy_out(ptr.addr(), bytes)
    }

    /// Copies a fixed-layout record from user memory.
    ///
    /// Only sound for types where every byte pattern is a valid value,
    /// which holds for all the boundary records.
    pub fn read_record<T: Copy>(&mut self, ptr: UserPtr<T>) -> Result<T, UserFault> {
        let mut value = MaybeUninit::<T>::uninit();
        // SAFETY: the MaybeUninit allocation is size_of::<T>() writable
        // bytes.
        let bytes = unsafe {
            core::slice::from_raw_parts_mut(value.as_mut_ptr().cast::<u8>(), size_of::<T>())
        };
        self.copy_in(ptr.addr(), bytes)?;
        // SAFETY: every byte was initialized by copy_in, and the caller's
        // contract says all byte patterns are valid for T.
        Ok(unsafe { value.assume_init() })
    }

    /// Copies a NUL-terminated string from user memory into `buf` and
    /// returns it as a string slice. Fails if no NUL appears within
    /// `buf.len()` bytes or the bytes are not UTF-8.
    pub fn read_cstr<'b>(&mut self, vaddr: VirtAddr, buf: &'b mut [u8]) -> Result<&'b str, UserFault> {
        if vaddr.as_u32() == 0 {
            return Err(UserFault::BadAddress);
        }
        let mut len = 0;
        let mut cursor = vaddr;
        // Byte-wise walk: the string may end just before an unmapped page,
        // and reading past the NUL must not fault.
        while len < buf.len() {
            let paddr = self.translate(cursor, false)?;
            let mut byte = [0u8; 1];
            self.window.read_bytes(paddr, &mut byte);
            if byte[0] == 0 {
                let text = core::str::from_utf8(&buf[..len]).map_err(|_| UserFault::BadAddress)?;
                return Ok(text);
            }
            buf[len] = byte[0];
            len += 1;
            cursor = cursor.checked_add(1).ok_or(UserFault::BadAddress)?;
        }
        Err(UserFault::BadAddress)
    }
}

impl Drop for UserAccess<'_> {
    fn drop(&mut self) {
        self.status.remove(StatusFlags::SUM);
    }
}

/// Largest run starting at `vaddr` that stays within one page.
fn chunk_within_page(vaddr: VirtAddr, len: usize) -> usize {
    let to_page_end = (PAGE_SIZE - vaddr.page_offset()) as usize;
    len.min(to_page_end)
}
