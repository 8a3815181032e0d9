//! Collaborator interfaces.
//!
//! Everything outside the core — console, timer, wall clock, filesystem,
//! and the built-in application images — is consumed through these traits.
//! The collaborators expose plain data back into the core and nothing else;
//! in particular, descriptor tables are entirely filesystem-owned state
//! keyed by pid, which the core touches through exactly two upcalls:
//! [`FileSystem::copy_descriptors`] on fork and [`FileSystem::recycle`] on
//! slot reclamation.

use meson_syscall::Dirent;

/// Platform services: console bytes, timer re-arming, and the wall clock.
pub trait Services {
    /// Writes one byte to the console.
    fn console_put(&mut self, byte: u8);

    /// Polls the console for one pending input byte.
    fn console_poll(&mut self) -> Option<u8>;

    /// Programs the next timer deadline. Called at the top of every timer
    /// trap, before any work that could reschedule.
    fn timer_rearm(&mut self);

    /// Reads the monotonic wall clock in nanoseconds.
    fn now_ns(&mut self) -> u64;
}

/// The filesystem collaborator. All descriptor state lives on this side of
/// the boundary; results are plain non-negative values or negative error
/// codes forwarded verbatim to user space.
pub trait FileSystem {
    /// Opens `path` for `pid`, returning a descriptor or a negative code.
    fn open(&mut self, pid: i32, path: &str, flags: u32) -> i32;

    /// Closes a descriptor.
    fn close(&mut self, pid: i32, fd: i32) -> i32;

    /// Reads from a descriptor into `buf`, returning the byte count.
    fn read(&mut self, pid: i32, fd: i32, buf: &mut [u8]) -> i32;

    /// Writes `buf` to a descriptor, returning the byte count.
    fn write(&mut self, pid: i32, fd: i32, buf: &[u8]) -> i32;

    /// Creates a directory.
    fn mkdir(&mut self, path: &str) -> i32;

    /// Returns the directory entry at `index` under `path`, or a negative
    /// code once the index runs past the end.
    fn readdir(&mut self, path: &str, index: i32) -> Result<Dirent, i32>;

    /// Removes a file.
    fn unlink(&mut self, path: &str) -> i32;

    /// Removes an empty directory.
    fn rmdir(&mut self, path: &str) -> i32;

    /// Duplicates `old_fd` onto `new_fd` for `pid`.
    fn dup2(&mut self, pid: i32, old_fd: i32, new_fd: i32) -> i32;

    /// Resolves a path to its opaque `(mount, node)` identifiers, used by
    /// `chdir`. The identifiers mean nothing to the core.
    fn resolve(&mut self, path: &str) -> Option<(i32, i32)>;

    /// Duplicates every descriptor owned by `parent` for `child`. Called as
    /// the final step of fork, before the child becomes runnable; a
    /// negative return aborts the fork.
    fn copy_descriptors(&mut self, parent: i32, child: i32) -> i32;

    /// Drops every descriptor owned by `pid`. Called whenever a process
    /// slot is reclaimed.
    fn recycle(&mut self, pid: i32);
}

/// One built-in application image in the spawn/exec catalog.
#[derive(Debug, Clone, Copy)]
pub struct AppImage {
    /// Catalog id, matched against the `APP_ID_*` constants.
    pub id: i32,
    /// Process name given to instances of this image.
    pub name: &'static str,
    /// The raw image bytes, copied to the user base at load.
    pub image: &'static [u8],
}

/// Looks up a catalog entry by id.
pub fn catalog_lookup(catalog: &[AppImage], id: i32) -> Option<&AppImage> {
    catalog.iter().find(|app| app.id == id)
}
