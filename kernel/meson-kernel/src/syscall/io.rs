//! Console character I/O.

use crate::kernel::Kernel;
use crate::proc::{ProcState, WaitReason};
use crate::services::{FileSystem, Services};
use crate::syscall::Flow;
use crate::trap::Trapframe;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// `putchar(byte)` — write one byte to the console.
    pub(crate) fn sys_putchar(&mut self, frame: &mut Trapframe) -> Flow {
        self.services.console_put(frame.a0 as u8);
        frame.set_result(0);
        Flow::Advance
    }

    /// `getchar()` — pop one byte from the input queue, blocking until one
    /// arrives.
    ///
    /// When the queue is empty even after a fresh poll, the caller parks as
    /// Waiting(ConsoleInput) with its pc still on the call instruction; the
    /// timer-driven poll wakes it and the re-executed call finds the byte.
    pub(crate) fn sys_getchar(&mut self, frame: &mut Trapframe) -> Flow {
        if let Some(byte) = self.input.pop() {
            frame.set_result(i32::from(byte));
            return Flow::Advance;
        }

        self.poll_console();
        if let Some(byte) = self.input.pop() {
            frame.set_result(i32::from(byte));
            return Flow::Advance;
        }

        self.table.slots[self.current].state = ProcState::Waiting(WaitReason::ConsoleInput);
        self.schedule(frame);
        Flow::NoAdvance
    }
}
