//! Syscall dispatch.
//!
//! A fixed numeric-code table routes each trapped call (number in `a3`) to
//! one handler. Handlers write their result into the frame's `a0` and
//! report how the trap should return:
//!
//! - [`Flow::Advance`] — the ordinary case: the trap-return path steps the
//!   saved pc past the call instruction.
//! - [`Flow::NoAdvance`] — the handler already decided the resume point.
//!   This covers a successful `exec` (the frame now starts the new image),
//!   every blocking call (the pc stays on the call instruction so the call
//!   re-executes after the wake condition fires), and any handler that
//!   switched to another process entirely.
//!
//! An unknown syscall number is a fatal kernel error, matching the policy
//! for unexpected trap causes.

mod io;
mod ipc;
mod process;
mod query;
mod time;
mod uaccess;
mod vfs;

pub use uaccess::{UserAccess, UserFault, UserPtr};

use meson_syscall as abi;

use crate::kernel::Kernel;
use crate::services::{FileSystem, Services};
use crate::trap::Trapframe;

/// How the trap-return path treats the saved pc after a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Step past the call instruction.
    Advance,
    /// The handler set the resume point itself.
    NoAdvance,
}

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// Routes the trapped syscall in `frame` to its handler.
    pub(crate) fn dispatch_syscall(&mut self, frame: &mut Trapframe) -> Flow {
        match frame.a3 {
            abi::SYS_PUTCHAR => self.sys_putchar(frame),
            abi::SYS_GETCHAR => self.sys_getchar(frame),
            abi::SYS_EXIT => self.sys_exit(frame),
            abi::SYS_PS => self.sys_ps(frame),
            abi::SYS_SPAWN => self.sys_spawn(frame),
            abi::SYS_BITMAP => self.sys_bitmap(frame),
            abi::SYS_WAITPID => self.sys_waitpid(frame),
            abi::SYS_IPC_SEND => self.sys_ipc_send(frame),
            abi::SYS_IPC_RECV => self.sys_ipc_recv(frame),
            abi::SYS_KILL => self.sys_kill(frame),
            abi::SYS_KERNEL_INFO => self.sys_kernel_info(frame),
            abi::SYS_FORK => self.sys_fork(frame),
            abi::SYS_EXEC => self.sys_exec(frame),
            abi::SYS_GETARGS => self.sys_getargs(frame),
            abi::SYS_OPEN => self.sys_open(frame),
            abi::SYS_CLOSE => self.sys_close(frame),
            abi::SYS_READ => self.sys_read(frame),
            abi::SYS_WRITE => self.sys_write(frame),
            abi::SYS_MKDIR => self.sys_mkdir(frame),
            abi::SYS_READDIR => self.sys_readdir(frame),
            abi::SYS_UNLINK => self.sys_unlink(frame),
            abi::SYS_RMDIR => self.sys_rmdir(frame),
            abi::SYS_DUP2 => self.sys_dup2(frame),
            abi::SYS_GETCWD => self.sys_getcwd(frame),
            abi::SYS_CHDIR => self.sys_chdir(frame),
            abi::SYS_GETTIME => self.sys_gettime(frame),
            unknown => panic!("undefined system call {unknown}"),
        }
    }
}
