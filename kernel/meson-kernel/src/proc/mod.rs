//! The process table.
//!
//! A fixed array of slots, one per possible process, indexed by pid. Slot 0
//! belongs to the idle process (pid 0) for the machine's lifetime, so user
//! pids are always positive. Each slot embeds its own kernel stack; the
//! table as a whole is the kernel's single largest static structure, and
//! exactly one logical owner mutates it at a time.
//!
//! Lifecycle: `Unused → Runnable ⇄ Waiting → Exited → (reclaimed) → Unused`.
//! An Exited slot lingers as a zombie while a live parent may still collect
//! it via `waitpid`; once orphaned it is reaped opportunistically by the
//! next table scan. Reclamation bumps the slot's generation so stale
//! references are detectable.

mod lifecycle;

use meson_mm::AddressSpace;
use meson_syscall::{
    FS_NAME_MAX, FS_PATH_MAX, PROC_STATE_EXITED, PROC_STATE_RUNNABLE, PROC_STATE_UNUSED,
    PROC_STATE_WAITING, WAIT_REASON_CHILD_EXIT, WAIT_REASON_CONSOLE_INPUT, WAIT_REASON_MAILBOX_RECV,
    WAIT_REASON_NONE,
};

use crate::config::{KERNEL_STACK_SIZE, PROCS_MAX};
use crate::trap::Resume;
use meson_syscall::ExecArgs;

/// Scheduling state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Slot is free.
    Unused,
    /// Process can be scheduled.
    Runnable,
    /// Process is blocked inside a syscall for the given reason.
    Waiting(WaitReason),
    /// Process has terminated; the slot persists until reaped.
    Exited,
}

impl ProcState {
    /// Returns the numeric encoding used across the syscall boundary.
    pub fn code(self) -> u32 {
        match self {
            Self::Unused => PROC_STATE_UNUSED,
            Self::Runnable => PROC_STATE_RUNNABLE,
            Self::Waiting(_) => PROC_STATE_WAITING,
            Self::Exited => PROC_STATE_EXITED,
        }
    }
}

/// Why a Waiting process is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Blocked in `getchar` until console input arrives.
    ConsoleInput,
    /// Blocked in `waitpid` until a matching child exits.
    ChildExit,
    /// Blocked in `ipc_recv` until a message is delivered.
    MailboxRecv,
}

impl WaitReason {
    /// Returns the numeric encoding used across the syscall boundary.
    pub fn code(self) -> u32 {
        match self {
            Self::ConsoleInput => WAIT_REASON_CONSOLE_INPUT,
            Self::ChildExit => WAIT_REASON_CHILD_EXIT,
            Self::MailboxRecv => WAIT_REASON_MAILBOX_RECV,
        }
    }
}

/// Returns the wait-reason encoding of a state, `WAIT_REASON_NONE` if not
/// waiting.
pub fn wait_reason_code(state: ProcState) -> u32 {
    match state {
        ProcState::Waiting(reason) => reason.code(),
        _ => WAIT_REASON_NONE,
    }
}

/// One pending mailbox message.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    /// Sender pid.
    pub from: i32,
    /// Payload word.
    pub payload: u32,
}

/// Filesystem root/working-directory state. The identifiers are opaque to
/// the core; the filesystem collaborator owns their meaning.
#[derive(Debug, Clone, Copy)]
pub struct CwdState {
    /// Opaque mount identifier.
    pub mount: i32,
    /// Opaque node identifier.
    pub node: i32,
    /// Current working directory path, NUL-terminated.
    pub path: [u8; FS_PATH_MAX],
}

impl CwdState {
    /// The filesystem root.
    pub const fn root() -> Self {
        let mut path = [0u8; FS_PATH_MAX];
        path[0] = b'/';
        Self {
            mount: 0,
            node: 0,
            path,
        }
    }

    /// Returns the path as a string slice (up to the NUL).
    pub fn path_str(&self) -> &str {
        let len = self.path.iter().position(|&b| b == 0).unwrap_or(FS_PATH_MAX);
        core::str::from_utf8(&self.path[..len]).unwrap_or("/")
    }
}

/// A fixed-size, 16-byte aligned per-process kernel stack.
#[repr(C, align(16))]
pub struct KernelStack(pub [u8; KERNEL_STACK_SIZE]);

impl KernelStack {
    const ZEROED: Self = Self([0; KERNEL_STACK_SIZE]);

    /// Returns the address one past the stack's highest byte — where the
    /// stack pointer begins.
    pub fn top(&self) -> usize {
        self.0.as_ptr() as usize + KERNEL_STACK_SIZE
    }

    /// Returns `true` if `sp` points into this stack (top inclusive).
    pub fn contains_sp(&self, sp: usize) -> bool {
        let base = self.0.as_ptr() as usize;
        sp > base && sp <= base + KERNEL_STACK_SIZE
    }
}

/// One process-table slot.
pub struct Process {
    /// Process id: the slot index while claimed, 0 while unused.
    pub pid: i32,
    /// Bumped every time the slot is reclaimed; a holder of a stale pid can
    /// detect reuse by comparing generations.
    pub generation: u32,
    /// Parent pid, 0 for none.
    pub parent: i32,
    /// Process name, NUL-padded.
    pub name: [u8; FS_NAME_MAX],
    /// Scheduling state.
    pub state: ProcState,
    /// Target filter of a blocked `waitpid` (`WAIT_ANY` for any child).
    pub wait_pid: i32,
    /// Remaining quantum ticks.
    pub time_slice: u32,
    /// Cumulative ticks spent running.
    pub run_ticks: u32,
    /// Times this slot has been scheduled in.
    pub schedule_count: u32,
    /// The owned address space; `None` only for the idle slot and while
    /// unused.
    pub space: Option<AddressSpace>,
    /// How the process continues when next scheduled.
    pub resume: Resume,
    /// The one-slot mailbox.
    pub mailbox: Option<Message>,
    /// Exec argument block, reported by `getargs`.
    pub args: ExecArgs,
    /// Filesystem root/cwd state.
    pub cwd: CwdState,
    /// The private kernel stack.
    pub stack: KernelStack,
}

impl Process {
    /// An unclaimed slot.
    pub const VACANT: Self = Self {
        pid: 0,
        generation: 0,
        parent: 0,
        name: [0; FS_NAME_MAX],
        state: ProcState::Unused,
        wait_pid: 0,
        time_slice: 0,
        run_ticks: 0,
        schedule_count: 0,
        space: None,
        resume: Resume::UserEntry,
        mailbox: None,
        args: ExecArgs::empty(),
        cwd: CwdState::root(),
        stack: KernelStack::ZEROED,
    };

    /// Stores `name`, truncated and NUL-padded.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; FS_NAME_MAX];
        let bytes = name.as_bytes();
        let len = bytes.len().min(FS_NAME_MAX - 1);
        self.name[..len].copy_from_slice(&bytes[..len]);
    }

    /// Returns whether the slot holds a live (Runnable/Waiting) process.
    pub fn is_live(&self) -> bool {
        matches!(self.state, ProcState::Runnable | ProcState::Waiting(_))
    }

    /// Resets every per-process field except the stack and generation,
    /// returning the slot to Unused. The address space must already have
    /// been torn down.
    pub(crate) fn reset(&mut self) {
        debug_assert!(self.space.is_none(), "slot reset with a live address space");
        self.pid = 0;
        self.parent = 0;
        self.name = [0; FS_NAME_MAX];
        self.state = ProcState::Unused;
        self.wait_pid = 0;
        self.time_slice = 0;
        self.run_ticks = 0;
        self.schedule_count = 0;
        self.resume = Resume::UserEntry;
        self.mailbox = None;
        self.args = ExecArgs::empty();
        self.cwd = CwdState::root();
        self.generation += 1;
    }
}

/// The fixed process table.
pub struct ProcessTable {
    /// The slots, indexed by pid.
    pub slots: [Process; PROCS_MAX],
}

impl ProcessTable {
    /// A table of vacant slots.
    pub fn new() -> Self {
        Self {
            slots: [const { Process::VACANT }; PROCS_MAX],
        }
    }

    /// Finds the lowest Unused slot index.
    pub fn find_unused(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.state == ProcState::Unused)
    }

    /// Returns the slot index of the live process with `pid`, if any.
    /// Exited and Unused slots do not count: a zombie is no longer a valid
    /// target for kill or IPC.
    pub fn live_index(&self, pid: i32) -> Option<usize> {
        if pid <= 0 || pid as usize >= PROCS_MAX {
            return None;
        }
        let slot = &self.slots[pid as usize];
        (slot.pid == pid && slot.is_live()).then_some(pid as usize)
    }

    /// Re-derives which process trapped from the trapped kernel stack
    /// pointer. Trap entry uses this rather than trusting a possibly-stale
    /// current-process field, because a timer interrupt can arrive while
    /// supervisor code is running on behalf of a different bookkeeping
    /// path.
    pub fn owner_of_kernel_sp(&self, sp: usize) -> Option<usize> {
        self.slots.iter().position(|slot| slot.stack.contains_sp(sp))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
