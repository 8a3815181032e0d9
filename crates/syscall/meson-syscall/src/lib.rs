//! Single source of truth for meson syscall definitions.
//!
//! Everything that crosses the user/supervisor boundary lives here: syscall
//! numbers, per-call error codes, and the fixed-layout `#[repr(C)]` records
//! copied across the boundary. Both the kernel and the user runtime depend
//! on this crate, so the two sides can never drift apart.
//!
//! # Calling convention
//!
//! The syscall number travels in `a3`; up to three arguments travel in
//! `a0`–`a2`; the result comes back in `a0`. A negative result is an error
//! code specific to the call (see the `*_ERR_*` constants).

#![no_std]

// ---------------------------------------------------------------------------
// Syscall numbers
// ---------------------------------------------------------------------------

/// Write one byte to the console.
pub const SYS_PUTCHAR: u32 = 1;
/// Read one byte from the console, blocking until input arrives.
pub const SYS_GETCHAR: u32 = 2;
/// Terminate the calling process. Does not return.
pub const SYS_EXIT: u32 = 3;
/// Copy the process-table entry at a slot index into a [`PsInfo`].
pub const SYS_PS: u32 = 4;
/// Create a new process from a built-in application image.
pub const SYS_SPAWN: u32 = 5;
/// Query the allocation state of one physical page (debug).
pub const SYS_BITMAP: u32 = 6;
/// Wait for a child to exit and reap its slot.
pub const SYS_WAITPID: u32 = 7;
/// Deliver a one-word message to another process's mailbox.
pub const SYS_IPC_SEND: u32 = 8;
/// Block until the caller's mailbox holds a message, then drain it.
pub const SYS_IPC_RECV: u32 = 9;
/// Forcibly terminate another process.
pub const SYS_KILL: u32 = 10;
/// Copy a [`KernelInfo`] record to user memory.
pub const SYS_KERNEL_INFO: u32 = 11;
/// Duplicate the calling process. Returns 0 in the child.
pub const SYS_FORK: u32 = 12;
/// Replace the calling process's image with a catalog application.
pub const SYS_EXEC: u32 = 13;
/// Copy the exec argument block of the calling process to user memory.
pub const SYS_GETARGS: u32 = 14;
/// Open a file by path. Forwarded to the filesystem collaborator.
pub const SYS_OPEN: u32 = 15;
/// Close a file descriptor.
pub const SYS_CLOSE: u32 = 16;
/// Read from a file descriptor.
pub const SYS_READ: u32 = 17;
/// Write to a file descriptor.
pub const SYS_WRITE: u32 = 18;
/// Create a directory.
pub const SYS_MKDIR: u32 = 19;
/// Read one directory entry by index.
pub const SYS_READDIR: u32 = 20;
/// Remove a file.
pub const SYS_UNLINK: u32 = 21;
/// Remove an empty directory.
pub const SYS_RMDIR: u32 = 22;
/// Duplicate a file descriptor onto another descriptor number.
pub const SYS_DUP2: u32 = 23;
/// Copy the current working directory path to user memory.
pub const SYS_GETCWD: u32 = 24;
/// Change the current working directory.
pub const SYS_CHDIR: u32 = 25;
/// Read the wall clock. Forwarded to the clock collaborator.
pub const SYS_GETTIME: u32 = 26;

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

/// Generic failure: bad argument, faulting user pointer, no free slot, or a
/// collaborator refusal. Calls with a richer error vocabulary document their
/// own codes below.
pub const ERR_FAIL: i32 = -1;

/// `kill`: the target pid was zero or negative.
pub const KILL_ERR_INVALID_PID: i32 = -1;
/// `kill`: no live process has the target pid.
pub const KILL_ERR_NO_SUCH_PROCESS: i32 = -2;
/// `kill`: the init process cannot be killed.
pub const KILL_ERR_INIT_PROTECTED: i32 = -3;

/// `ipc_send`: the destination does not exist or has exited.
pub const SEND_ERR_NO_SUCH_PROCESS: i32 = -1;
/// `ipc_send`: the destination's mailbox already holds a message.
pub const SEND_ERR_MAILBOX_FULL: i32 = -2;

/// `waitpid`: the caller has no child matching the request.
pub const WAIT_ERR_NO_CHILD: i32 = -1;

// ---------------------------------------------------------------------------
// Process states as they appear in `PsInfo`
// ---------------------------------------------------------------------------

/// Slot is free.
pub const PROC_STATE_UNUSED: u32 = 0;
/// Process can be scheduled.
pub const PROC_STATE_RUNNABLE: u32 = 1;
/// Process is blocked inside a syscall.
pub const PROC_STATE_WAITING: u32 = 2;
/// Process has terminated; the slot lingers until reaped.
pub const PROC_STATE_EXITED: u32 = 3;

/// Not waiting.
pub const WAIT_REASON_NONE: u32 = 0;
/// Blocked in `getchar` until console input arrives.
pub const WAIT_REASON_CONSOLE_INPUT: u32 = 1;
/// Blocked in `waitpid` until a matching child exits.
pub const WAIT_REASON_CHILD_EXIT: u32 = 2;
/// Blocked in `ipc_recv` until a message is delivered.
pub const WAIT_REASON_MAILBOX_RECV: u32 = 3;

/// `waitpid` target meaning "any child".
pub const WAIT_ANY: i32 = -1;

// ---------------------------------------------------------------------------
// Built-in application catalog ids
// ---------------------------------------------------------------------------

/// Command-line shell (the init process image).
pub const APP_ID_SHELL: i32 = 1;
/// Mailbox receiver demo.
pub const APP_ID_IPC_RX: i32 = 2;
/// Process listing.
pub const APP_ID_PS: i32 = 3;
/// Wall-clock display.
pub const APP_ID_DATE: i32 = 4;
/// Directory listing.
pub const APP_ID_LS: i32 = 5;
/// Directory creation.
pub const APP_ID_MKDIR: i32 = 6;
/// Directory removal.
pub const APP_ID_RMDIR: i32 = 7;
/// File creation.
pub const APP_ID_TOUCH: i32 = 8;
/// File removal.
pub const APP_ID_RM: i32 = 9;
/// File writing.
pub const APP_ID_WRITE: i32 = 10;
/// File display.
pub const APP_ID_CAT: i32 = 11;
/// Forced termination.
pub const APP_ID_KILL: i32 = 12;
/// Kernel information display.
pub const APP_ID_KERNEL_INFO: i32 = 14;
/// Physical page bitmap display.
pub const APP_ID_BITMAP: i32 = 15;

// ---------------------------------------------------------------------------
// Filesystem constants
// ---------------------------------------------------------------------------

/// Longest path accepted across the boundary, including the NUL.
pub const FS_PATH_MAX: usize = 64;
/// Longest name stored in a directory entry, including the NUL.
pub const FS_NAME_MAX: usize = 16;
/// Largest single read/write the passthrough forwards in one call.
pub const FS_IO_MAX: usize = 512;

/// Open for reading.
pub const O_RDONLY: u32 = 0x1;
/// Open for writing.
pub const O_WRONLY: u32 = 0x2;
/// Open for reading and writing.
pub const O_RDWR: u32 = O_RDONLY | O_WRONLY;
/// Create the file if it does not exist.
pub const O_CREAT: u32 = 0x10;
/// Truncate the file on open.
pub const O_TRUNC: u32 = 0x20;

/// Directory entry is a regular file.
pub const FS_TYPE_FILE: i32 = 1;
/// Directory entry is a directory.
pub const FS_TYPE_DIR: i32 = 2;

// ---------------------------------------------------------------------------
// Exec argument limits
// ---------------------------------------------------------------------------

/// Maximum number of exec arguments.
pub const ARGV_MAX: usize = 8;
/// Maximum length of one exec argument, including the NUL.
pub const ARG_MAX: usize = 32;

/// Length of the kernel version string in [`KernelInfo`], including padding.
pub const KERNEL_VERSION_MAX: usize = 16;

// ---------------------------------------------------------------------------
// Boundary records
// ---------------------------------------------------------------------------

/// One process-table entry as reported by the `ps` syscall.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PsInfo {
    /// Process id, 0 while the slot is unused.
    pub pid: i32,
    /// Parent process id, 0 for none.
    pub parent_pid: i32,
    /// One of the `PROC_STATE_*` constants.
    pub state: u32,
    /// One of the `WAIT_REASON_*` constants.
    pub wait_reason: u32,
    /// Process name, NUL-padded.
    pub name: [u8; FS_NAME_MAX],
    /// Timer ticks this process has run for.
    pub run_ticks: u32,
    /// How many times this process has been scheduled in.
    pub schedule_count: u32,
}

impl PsInfo {
    /// An all-zero record describing an unused slot.
    pub const fn unused() -> Self {
        Self {
            pid: 0,
            parent_pid: 0,
            state: PROC_STATE_UNUSED,
            wait_reason: WAIT_REASON_NONE,
            name: [0; FS_NAME_MAX],
            run_ticks: 0,
            schedule_count: 0,
        }
    }
}

/// Static kernel facts reported by the `kernel_info` syscall.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KernelInfo {
    /// Version string, NUL-padded.
    pub version: [u8; KERNEL_VERSION_MAX],
    /// Number of physical pages under allocator management.
    pub total_pages: u32,
    /// Page size in bytes.
    pub page_size: u32,
    /// Base of the kernel identity mapping.
    pub kernel_base: u32,
    /// Virtual base of every user image.
    pub user_base: u32,
    /// Number of process-table slots.
    pub proc_max: u32,
    /// Size of one kernel stack in bytes.
    pub kernel_stack_bytes: u32,
    /// Scheduler quantum in timer ticks.
    pub time_slice_ticks: u32,
    /// Timer interrupt interval in milliseconds.
    pub timer_interval_ms: u32,
}

/// Wall-clock reading reported by the `gettime` syscall.
///
/// Seconds are split into two 32-bit halves because the machine word is
/// 32 bits wide.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TimeSpec {
    /// Low 32 bits of the seconds count.
    pub sec_lo: u32,
    /// High 32 bits of the seconds count.
    pub sec_hi: u32,
    /// Nanoseconds within the current second.
    pub nsec: u32,
}

/// The exec argument block, copied out by the `getargs` syscall.
///
/// Arguments are stored inline as NUL-terminated byte strings rather than
/// as pointers, so the record has the same meaning in every address space.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ExecArgs {
    /// Number of valid entries in `argv`.
    pub argc: i32,
    /// Argument strings, each NUL-terminated within its slot.
    pub argv: [[u8; ARG_MAX]; ARGV_MAX],
}

impl ExecArgs {
    /// An empty argument block.
    pub const fn empty() -> Self {
        Self {
            argc: 0,
            argv: [[0; ARG_MAX]; ARGV_MAX],
        }
    }
}

impl Default for ExecArgs {
    fn default() -> Self {
        Self::empty()
    }
}

/// One directory entry as reported by the `readdir` syscall.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Dirent {
    /// Entry name, NUL-padded.
    pub name: [u8; FS_NAME_MAX],
    /// [`FS_TYPE_FILE`] or [`FS_TYPE_DIR`].
    pub kind: i32,
    /// File size in bytes; 0 for directories.
    pub size: u32,
}
