//! Process lifecycle: creation, duplication, replacement, termination, and
//! slot reclamation.

use meson_core::{kdebug, kinfo};
use meson_mm::AddressSpace;
use meson_syscall::ExecArgs;

use crate::config::TIME_SLICE_TICKS;
use crate::kernel::Kernel;
use crate::proc::{ProcState, WaitReason};
use crate::services::{FileSystem, Services};
use crate::trap::{Resume, Trapframe};

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// Creates a process from a raw image.
    ///
    /// Reaps exited orphans first so a lingering slot can be reused, then
    /// claims the lowest Unused slot. Returns `None` when the table is
    /// full — an ordinary operating condition, never a panic. The new
    /// process is Runnable immediately, resuming at the fixed user entry.
    pub(crate) fn create_process(&mut self, image: &[u8], name: &str, parent: i32) -> Option<i32> {
        self.reap_orphans();

        let index = self.table.find_unused()?;

        let mut space = AddressSpace::build(&mut self.alloc, &self.layout);
        space.load_image(&mut self.alloc, image);

        let slot = &mut self.table.slots[index];
        slot.pid = index as i32;
        slot.parent = parent;
        slot.set_name(name);
        slot.state = ProcState::Runnable;
        slot.wait_pid = 0;
        slot.time_slice = TIME_SLICE_TICKS;
        slot.run_ticks = 0;
        slot.schedule_count = 0;
        slot.space = Some(space);
        slot.resume = Resume::UserEntry;
        slot.mailbox = None;
        slot.args = ExecArgs::empty();

        kinfo!(
            "proc: created pid {} ({name}), {} user pages",
            slot.pid,
            slot.space.as_ref().map_or(0, AddressSpace::user_pages)
        );
        Some(index as i32)
    }

    /// Duplicates the current process.
    ///
    /// The child gets its own kernel+device mappings and an eager byte copy
    /// of every mapped user page, permission bits preserved. Its resume
    /// state is the fork-return splice of `frame`, so its first
    /// scheduling-in observes `fork() == 0` one instruction past the call.
    /// Any mid-construction failure reclaims the child completely; the
    /// parent is unaffected either way.
    pub(crate) fn fork_current(&mut self, frame: &Trapframe) -> i32 {
        let parent_index = self.current;
        let parent_pid = self.table.slots[parent_index].pid;
        if !self.table.slots[parent_index].is_live() {
            return -1;
        }

        self.reap_orphans();
        let Some(child_index) = self.table.find_unused() else {
            kdebug!("fork: no free slot for pid {parent_pid}");
            return -1;
        };

        let mut space = AddressSpace::build(&mut self.alloc, &self.layout);
        space.clone_user_from(
            &mut self.alloc,
            self.table.slots[parent_index]
                .space
                .as_ref()
                .expect("forking process has no address space"),
        );

        let child_pid = child_index as i32;

        // Descriptor duplication is the last step that can fail; the child
        // must never become Runnable with a half-built descriptor table.
        if self.fs.copy_descriptors(parent_pid, child_pid) < 0 {
            kdebug!("fork: descriptor duplication refused for pid {parent_pid}");
            space.teardown(&mut self.alloc);
            return -1;
        }

        let (name, args, cwd) = {
            let parent = &self.table.slots[parent_index];
            (parent.name, parent.args, parent.cwd)
        };

        let child = &mut self.table.slots[child_index];
        child.pid = child_pid;
        child.parent = parent_pid;
        child.name = name;
        child.args = args;
        child.cwd = cwd;
        child.state = ProcState::Runnable;
        child.wait_pid = 0;
        child.time_slice = TIME_SLICE_TICKS;
        child.run_ticks = 0;
        child.schedule_count = 0;
        child.space = Some(space);
        child.resume = Resume::fork_splice(frame);
        child.mailbox = None;

        kinfo!("proc: pid {parent_pid} forked pid {child_pid}");
        child_pid
    }

    /// Terminates the current process voluntarily.
    ///
    /// Children are orphaned so they become reapable; a parent blocked in a
    /// matching `waitpid` is woken to collect the zombie. The scheduling
    /// handoff never returns to the caller — its kernel stack is still in
    /// use, so the slot itself is reclaimed later by whoever reaps it.
    pub(crate) fn exit_current(&mut self, frame: &mut Trapframe) {
        let pid = self.table.slots[self.current].pid;
        kinfo!("proc: pid {pid} exit");

        self.table.slots[self.current].state = ProcState::Exited;
        self.orphan_children(pid);
        self.wake_exit_waiter(pid);

        if pid == self.init_pid() {
            self.shutdown();
            return;
        }

        self.schedule(frame);
    }

    /// Forcibly terminates `target`.
    ///
    /// Error codes are distinct per cause: invalid pid, no such live
    /// process, and the protected init process. Killing another process
    /// reclaims its slot synchronously — kill has no zombie window, unlike
    /// natural exit. Killing yourself behaves like exit: the handoff leaves
    /// the slot Exited and scheduling it again is a fatal invariant
    /// violation.
    pub(crate) fn kill_process(&mut self, frame: &mut Trapframe, target: i32) -> Option<i32> {
        use meson_syscall::{KILL_ERR_INIT_PROTECTED, KILL_ERR_INVALID_PID, KILL_ERR_NO_SUCH_PROCESS};

        if target <= 0 {
            return Some(KILL_ERR_INVALID_PID);
        }
        let Some(index) = self.table.live_index(target) else {
            return Some(KILL_ERR_NO_SUCH_PROCESS);
        };
        if target == self.init_pid() {
            return Some(KILL_ERR_INIT_PROTECTED);
        }

        kinfo!("proc: pid {} killed pid {target}", self.current_pid());

        self.table.slots[index].state = ProcState::Exited;
        self.orphan_children(target);
        // Wake a parent blocked in waitpid before the slot disappears; its
        // retried wait reports no child if nothing else remains.
        self.wake_exit_waiter(target);

        if index == self.current {
            // Self-kill: yield away for good. The slot stays Exited until
            // reaped; the scheduler's state assertion guarantees it can
            // never run again.
            self.schedule(frame);
            None
        } else {
            self.reclaim(index);
            Some(0)
        }
    }

    /// Releases everything a dead slot owns and returns it to Unused:
    /// user pages, second-level tables, and the root table, in that order,
    /// then the collaborator-held descriptors. Bumps the generation.
    pub(crate) fn reclaim(&mut self, index: usize) {
        let pid = self.table.slots[index].pid;
        if let Some(space) = self.table.slots[index].space.take() {
            space.teardown(&mut self.alloc);
        }
        self.fs.recycle(pid);
        self.table.slots[index].reset();
        kdebug!("proc: slot {index} (pid {pid}) reclaimed");
    }

    /// Clears the parent of every child of `pid`, making any Exited ones
    /// immediately reapable.
    pub(crate) fn orphan_children(&mut self, pid: i32) {
        for slot in &mut self.table.slots {
            if slot.state != ProcState::Unused && slot.parent == pid {
                slot.parent = 0;
            }
        }
    }

    /// Wakes the parent of `child_pid` if it is blocked in a `waitpid`
    /// matching that pid (exactly or as a wildcard).
    pub(crate) fn wake_exit_waiter(&mut self, child_pid: i32) {
        let parent_pid = self
            .table
            .slots
            .iter()
            .find(|slot| slot.pid == child_pid && slot.state != ProcState::Unused)
            .map(|slot| slot.parent)
            .unwrap_or(0);
        if parent_pid <= 0 {
            return;
        }

        let Some(parent_index) = self.table.live_index(parent_pid) else {
            return;
        };
        let parent = &mut self.table.slots[parent_index];
        if parent.state == ProcState::Waiting(WaitReason::ChildExit)
            && (parent.wait_pid == meson_syscall::WAIT_ANY || parent.wait_pid == child_pid)
        {
            parent.state = ProcState::Runnable;
        }
    }

    /// Pid of the init process.
    pub(crate) fn init_pid(&self) -> i32 {
        crate::config::INIT_PID
    }
}
