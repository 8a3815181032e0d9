//! Trap entry types: causes, the trapframe, the supervisor status word, and
//! the per-process resume state.
//!
//! A trap is the only way into the kernel. The entry stub captures the full
//! general-register file plus the trapped pc and status into a [`Trapframe`]
//! and hands it to [`crate::Kernel::handle_trap`]; whatever the frame holds
//! when the handler returns is what the machine resumes. A context switch is
//! therefore a frame swap: the outgoing process's frame is parked in its
//! slot as [`Resume::Frame`] and the incoming process's resume state is
//! materialized into the live frame.
//!
//! [`Resume`] is the initial-continuation value the lifecycle paths choose
//! per creation: fresh image entry for `create`, a spliced parent frame for
//! `fork`, the supervisor idle loop for slot 0.

mod frame;

pub use frame::{Resume, StatusFlags, Trapframe};

/// Decoded trap cause, as reported by the cause register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    /// Instruction fetch from a misaligned address.
    InstructionAddressMisaligned,
    /// Instruction fetch failed the physical memory protection check.
    InstructionAccessFault,
    /// Undecodable or privileged instruction.
    IllegalInstruction,
    /// Debug breakpoint.
    Breakpoint,
    /// Misaligned data load.
    LoadAddressMisaligned,
    /// Data load failed the physical memory protection check.
    LoadAccessFault,
    /// Misaligned data store.
    StoreAddressMisaligned,
    /// Data store failed the physical memory protection check.
    StoreAccessFault,
    /// System call instruction executed in user mode.
    EnvironmentCallFromUser,
    /// System call instruction executed in supervisor mode.
    EnvironmentCallFromSupervisor,
    /// Instruction fetch through an invalid page mapping.
    InstructionPageFault,
    /// Data load through an invalid page mapping.
    LoadPageFault,
    /// Data store through an invalid page mapping.
    StorePageFault,
    /// Supervisor timer interrupt.
    TimerInterrupt,
}

impl TrapCause {
    /// Returns the raw cause-register encoding (interrupt bit included).
    pub const fn code(self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned => 0x00,
            Self::InstructionAccessFault => 0x01,
            Self::IllegalInstruction => 0x02,
            Self::Breakpoint => 0x03,
            Self::LoadAddressMisaligned => 0x04,
            Self::LoadAccessFault => 0x05,
            Self::StoreAddressMisaligned => 0x06,
            Self::StoreAccessFault => 0x07,
            Self::EnvironmentCallFromUser => 0x08,
            Self::EnvironmentCallFromSupervisor => 0x09,
            Self::InstructionPageFault => 0x0c,
            Self::LoadPageFault => 0x0d,
            Self::StorePageFault => 0x0f,
            Self::TimerInterrupt => 0x8000_0005,
        }
    }
}
