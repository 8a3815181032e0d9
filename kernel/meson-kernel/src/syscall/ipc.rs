//! The one-slot mailbox.
//!
//! Capacity is exactly one pending message per process. Senders never
//! block: a full mailbox is reported as backpressure, not absorbed.
//! Receivers block until a message is present, then drain it atomically.

use meson_syscall::{SEND_ERR_MAILBOX_FULL, SEND_ERR_NO_SUCH_PROCESS};

use crate::kernel::Kernel;
use crate::proc::{Message, ProcState, WaitReason};
use crate::services::{FileSystem, Services};
use crate::syscall::{Flow, UserAccess, UserPtr};
use crate::trap::Trapframe;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// `ipc_send(dst, message)` — deliver one word to `dst`'s mailbox.
    ///
    /// Distinct failures: a dead or absent destination, and an occupied
    /// mailbox (which is left untouched).
    pub(crate) fn sys_ipc_send(&mut self, frame: &mut Trapframe) -> Flow {
        let dst = frame.a0 as i32;
        let payload = frame.a1;
        let sender = self.current_pid();

        if sender <= 0 {
            frame.set_result(SEND_ERR_NO_SUCH_PROCESS);
            return Flow::Advance;
        }
        let Some(index) = self.table.live_index(dst) else {
            frame.set_result(SEND_ERR_NO_SUCH_PROCESS);
            return Flow::Advance;
        };

        let slot = &mut self.table.slots[index];
        if slot.mailbox.is_some() {
            frame.set_result(SEND_ERR_MAILBOX_FULL);
            return Flow::Advance;
        }

        slot.mailbox = Some(Message {
            from: sender,
            payload,
        });
        if slot.state == ProcState::Waiting(WaitReason::MailboxRecv) {
            slot.state = ProcState::Runnable;
        }

        frame.set_result(0);
        Flow::Advance
    }

    /// `ipc_recv(&from_pid)` — block until the mailbox holds a message,
    /// then drain it and return the payload. The sender pid is written
    /// through the caller's pointer when one is given.
    pub(crate) fn sys_ipc_recv(&mut self, frame: &mut Trapframe) -> Flow {
        let from_ptr = frame.a0;
        let index = self.current;

        let Some(message) = self.table.slots[index].mailbox else {
            self.table.slots[index].state = ProcState::Waiting(WaitReason::MailboxRecv);
            self.schedule(frame);
            return Flow::NoAdvance;
        };

        if from_ptr != 0 {
            let Ok(ptr) = UserPtr::<i32>::new(from_ptr) else {
                frame.set_result(-1);
                return Flow::Advance;
            };
            let space = self.table.slots[index]
                .space
                .as_ref()
                .expect("receiving process has no address space");
            let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
            if access.write_record(ptr, &message.from).is_err() {
                // The message stays pending; the caller can retry with a
                // valid pointer.
                frame.set_result(-1);
                return Flow::Advance;
            }
        }

        self.table.slots[index].mailbox = None;
        frame.a0 = message.payload;
        Flow::Advance
    }
}
