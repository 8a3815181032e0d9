//! Filesystem passthrough.
//!
//! The core owns none of this: paths, descriptors, and directory contents
//! all live with the filesystem collaborator, keyed by pid. These handlers
//! only move bytes across the privilege boundary under the access guard
//! and forward the calls verbatim.

use meson_core::addr::VirtAddr;
use meson_syscall::{Dirent, FS_IO_MAX, FS_PATH_MAX};

use crate::kernel::Kernel;
use crate::services::{FileSystem, Services};
use crate::syscall::{Flow, UserAccess, UserFault, UserPtr};
use crate::trap::Trapframe;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// Copies a NUL-terminated user path into `buf` under the access guard.
    fn read_user_path<'b>(
        &mut self,
        raw: u32,
        buf: &'b mut [u8; FS_PATH_MAX],
    ) -> Result<&'b str, UserFault> {
        if raw == 0 {
            return Err(UserFault::BadAddress);
        }
        let space = self.table.slots[self.current]
            .space
            .as_ref()
            .expect("calling process has no address space");
        let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
        access.read_cstr(VirtAddr::new(raw), buf)
    }

    /// `open(path, flags)`.
    pub(crate) fn sys_open(&mut self, frame: &mut Trapframe) -> Flow {
        let pid = self.current_pid();
        let flags = frame.a1;
        let mut buf = [0u8; FS_PATH_MAX];
        let result = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => self.fs.open(pid, path, flags),
            Err(_) => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `close(fd)`.
    pub(crate) fn sys_close(&mut self, frame: &mut Trapframe) -> Flow {
        let pid = self.current_pid();
        frame.set_result(self.fs.close(pid, frame.a0 as i32));
        Flow::Advance
    }

    /// `read(fd, buf, size)` — read through a kernel bounce buffer, then
    /// copy out to the caller.
    pub(crate) fn sys_read(&mut self, frame: &mut Trapframe) -> Flow {
        let pid = self.current_pid();
        let fd = frame.a0 as i32;
        let size = (frame.a2 as usize).min(FS_IO_MAX);
        if frame.a1 == 0 && size > 0 {
            frame.set_result(-1);
            return Flow::Advance;
        }

        let mut bounce = [0u8; FS_IO_MAX];
        let count = self.fs.read(pid, fd, &mut bounce[..size]);
        if count > 0 {
            let space = self.table.slots[self.current]
                .space
                .as_ref()
                .expect("calling process has no address space");
            let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
            if access
                .copy_out(VirtAddr::new(frame.a1), &bounce[..count as usize])
                .is_err()
            {
                drop(access);
                frame.set_result(-1);
                return Flow::Advance;
            }
        }

        frame.set_result(count);
        Flow::Advance
    }

    /// `write(fd, buf, size)` — copy in from the caller, then write through
    /// the bounce buffer.
    pub(crate) fn sys_write(&mut self, frame: &mut Trapframe) -> Flow {
        let pid = self.current_pid();
        let fd = frame.a0 as i32;
        let size = (frame.a2 as usize).min(FS_IO_MAX);
        if frame.a1 == 0 && size > 0 {
            frame.set_result(-1);
            return Flow::Advance;
        }

        let mut bounce = [0u8; FS_IO_MAX];
        {
            let space = self.table.slots[self.current]
                .space
                .as_ref()
                .expect("calling process has no address space");
            let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
            if access
                .copy_in(VirtAddr::new(frame.a1), &mut bounce[..size])
                .is_err()
            {
                drop(access);
                frame.set_result(-1);
                return Flow::Advance;
            }
        }

        frame.set_result(self.fs.write(pid, fd, &bounce[..size]));
        Flow::Advance
    }

    /// `mkdir(path)`.
    pub(crate) fn sys_mkdir(&mut self, frame: &mut Trapframe) -> Flow {
        let mut buf = [0u8; FS_PATH_MAX];
        let result = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => self.fs.mkdir(path),
            Err(_) => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `readdir(path, index, &entry)`.
    pub(crate) fn sys_readdir(&mut self, frame: &mut Trapframe) -> Flow {
        let index = frame.a1 as i32;
        let Ok(out) = UserPtr::<Dirent>::new(frame.a2) else {
            frame.set_result(-1);
            return Flow::Advance;
        };

        let mut buf = [0u8; FS_PATH_MAX];
        let entry = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => self.fs.readdir(path, index),
            Err(_) => Err(-1),
        };

        let result = match entry {
            Ok(entry) => {
                let space = self.table.slots[self.current]
                    .space
                    .as_ref()
                    .expect("calling process has no address space");
                let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
                match access.write_record(out, &entry) {
                    Ok(()) => 0,
                    Err(_) => -1,
                }
            }
            Err(code) => code,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `unlink(path)`.
    pub(crate) fn sys_unlink(&mut self, frame: &mut Trapframe) -> Flow {
        let mut buf = [0u8; FS_PATH_MAX];
        let result = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => self.fs.unlink(path),
            Err(_) => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `rmdir(path)`.
    pub(crate) fn sys_rmdir(&mut self, frame: &mut Trapframe) -> Flow {
        let mut buf = [0u8; FS_PATH_MAX];
        let result = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => self.fs.rmdir(path),
            Err(_) => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `dup2(old_fd, new_fd)`.
    pub(crate) fn sys_dup2(&mut self, frame: &mut Trapframe) -> Flow {
        let pid = self.current_pid();
        frame.set_result(self.fs.dup2(pid, frame.a0 as i32, frame.a1 as i32));
        Flow::Advance
    }

    /// `getcwd(buf)` — copy the caller's working-directory path out,
    /// including the NUL.
    pub(crate) fn sys_getcwd(&mut self, frame: &mut Trapframe) -> Flow {
        if frame.a0 == 0 {
            frame.set_result(-1);
            return Flow::Advance;
        }

        let cwd = self.table.slots[self.current].cwd;
        let len = cwd.path.iter().position(|&b| b == 0).unwrap_or(FS_PATH_MAX - 1);
        let space = self.table.slots[self.current]
            .space
            .as_ref()
            .expect("calling process has no address space");
        let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
        let result = match access.copy_out(VirtAddr::new(frame.a0), &cwd.path[..=len]) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        drop(access);

        frame.set_result(result);
        Flow::Advance
    }

    /// `chdir(path)` — resolve through the collaborator and adopt the
    /// opaque identifiers it returns.
    pub(crate) fn sys_chdir(&mut self, frame: &mut Trapframe) -> Flow {
        let mut buf = [0u8; FS_PATH_MAX];
        let result = match self.read_user_path(frame.a0, &mut buf) {
            Ok(path) => match self.fs.resolve(path) {
                Some((mount, node)) => {
                    let path_len = path.len();
                    let slot = &mut self.table.slots[self.current];
                    slot.cwd.mount = mount;
                    slot.cwd.node = node;
                    slot.cwd.path = [0; FS_PATH_MAX];
                    slot.cwd.path[..path_len].copy_from_slice(&buf[..path_len]);
                    0
                }
                None => -1,
            },
            Err(_) => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }
}
