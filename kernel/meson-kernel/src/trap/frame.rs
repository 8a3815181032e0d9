//! The trapframe, the supervisor status word, and the resume state.

use crate::config::{INSN_SIZE, USER_BASE};

bitflags::bitflags! {
    /// Supervisor status bits the kernel manipulates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        /// Supervisor interrupts enabled.
        const SIE = 1 << 1;
        /// Interrupts will be re-enabled by the trap return.
        const SPIE = 1 << 5;
        /// The trap came from supervisor mode.
        const SPP = 1 << 8;
        /// Supervisor access to user pages is permitted. Set only inside a
        /// user-memory access guard.
        const SUM = 1 << 18;
    }
}

/// The full register snapshot captured at trap entry and restored at trap
/// return.
///
/// Syscall convention: number in `a3`, arguments in `a0`–`a2`, result in
/// `a0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trapframe {
    /// Return address register.
    pub ra: u32,
    /// Global pointer.
    pub gp: u32,
    /// Thread pointer.
    pub tp: u32,
    /// Temporary registers.
    pub t0: u32,
    /// Temporary registers.
    pub t1: u32,
    /// Temporary registers.
    pub t2: u32,
    /// Temporary registers.
    pub t3: u32,
    /// Temporary registers.
    pub t4: u32,
    /// Temporary registers.
    pub t5: u32,
    /// Temporary registers.
    pub t6: u32,
    /// Argument/result registers.
    pub a0: u32,
    /// Argument/result registers.
    pub a1: u32,
    /// Argument/result registers.
    pub a2: u32,
    /// Argument/result registers. Carries the syscall number.
    pub a3: u32,
    /// Argument/result registers.
    pub a4: u32,
    /// Argument/result registers.
    pub a5: u32,
    /// Argument/result registers.
    pub a6: u32,
    /// Argument/result registers.
    pub a7: u32,
    /// Callee-saved registers.
    pub s0: u32,
    /// Callee-saved registers.
    pub s1: u32,
    /// Callee-saved registers.
    pub s2: u32,
    /// Callee-saved registers.
    pub s3: u32,
    /// Callee-saved registers.
    pub s4: u32,
    /// Callee-saved registers.
    pub s5: u32,
    /// Callee-saved registers.
    pub s6: u32,
    /// Callee-saved registers.
    pub s7: u32,
    /// Callee-saved registers.
    pub s8: u32,
    /// Callee-saved registers.
    pub s9: u32,
    /// Callee-saved registers.
    pub s10: u32,
    /// Callee-saved registers.
    pub s11: u32,
    /// Stack pointer at the moment of the trap.
    pub sp: u32,
    /// Program counter at the moment of the trap.
    pub pc: u32,
    /// Status word at the moment of the trap.
    pub status: StatusFlags,
}

impl Trapframe {
    /// An all-zero frame.
    pub const fn zeroed() -> Self {
        Self {
            ra: 0,
            gp: 0,
            tp: 0,
            t0: 0,
            t1: 0,
            t2: 0,
            t3: 0,
            t4: 0,
            t5: 0,
            t6: 0,
            a0: 0,
            a1: 0,
            a2: 0,
            a3: 0,
            a4: 0,
            a5: 0,
            a6: 0,
            a7: 0,
            s0: 0,
            s1: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
            sp: 0,
            pc: 0,
            status: StatusFlags::empty(),
        }
    }

    /// The frame a fresh process starts from: entry at the user image base
    /// with interrupts armed for user mode. The user runtime's startup code
    /// establishes its own stack pointer.
    pub const fn user_entry() -> Self {
        let mut frame = Self::zeroed();
        frame.pc = USER_BASE;
        frame.status = StatusFlags::SPIE;
        frame
    }

    /// The frame the idle slot starts from: the supervisor idle loop with
    /// interrupts enabled.
    pub const fn idle_entry() -> Self {
        let mut frame = Self::zeroed();
        frame.status = StatusFlags::SIE.union(StatusFlags::SPP);
        frame
    }

    /// Writes a syscall result into the return-value register.
    pub fn set_result(&mut self, value: i32) {
        self.a0 = value as u32;
    }

    /// Advances the pc past the trapping instruction.
    pub fn advance_pc(&mut self) {
        self.pc += INSN_SIZE;
    }
}

/// How a process continues the next time the scheduler picks it.
///
/// Chosen per creation path and consumed exactly once per scheduling-in;
/// descheduling parks the live frame back as [`Resume::Frame`]. A process
/// that is on the CPU holds [`Resume::Running`], and scheduling one that
/// already does is a fatal bookkeeping error.
#[derive(Debug, Clone)]
pub enum Resume {
    /// First entry into a freshly loaded image.
    UserEntry,
    /// The supervisor idle loop (slot 0 only).
    Idle,
    /// A saved register snapshot: a descheduled process, or the fork-return
    /// splice of the parent's frame.
    Frame(Trapframe),
    /// Currently executing; there is nothing to resume from.
    Running,
}

impl Resume {
    /// The continuation a forked child starts from: the parent's exact
    /// trapped register snapshot, with the return value forced to zero (the
    /// child-visible fork result) and the pc advanced past the trap
    /// instruction, exactly as the parent will resume.
    pub fn fork_splice(parent: &Trapframe) -> Self {
        let mut frame = *parent;
        frame.a0 = 0;
        frame.advance_pc();
        Self::Frame(frame)
    }

    /// Consumes the resume state, producing the frame to load.
    pub fn take(&mut self) -> Trapframe {
        match core::mem::replace(self, Self::Running) {
            Self::UserEntry => Trapframe::user_entry(),
            Self::Idle => Trapframe::idle_entry(),
            Self::Frame(frame) => frame,
            Self::Running => panic!("process scheduled while already running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_splice_reproduces_parent_frame() {
        let mut parent = Trapframe::zeroed();
        parent.a0 = 12;
        parent.a3 = 99;
        parent.s3 = 0x1234;
        parent.sp = 0x0140_0000;
        parent.pc = 0x0100_0040;
        parent.status = StatusFlags::SPIE;

        let mut child = Resume::fork_splice(&parent);
        let frame = child.take();
        assert_eq!(frame.a0, 0, "child observes fork() == 0");
        assert_eq!(frame.pc, parent.pc + INSN_SIZE, "child resumes after the call");
        // Everything else is the parent's snapshot, bit for bit.
        assert_eq!(frame.a3, parent.a3);
        assert_eq!(frame.s3, parent.s3);
        assert_eq!(frame.sp, parent.sp);
        assert_eq!(frame.status, parent.status);
    }

    #[test]
    fn user_entry_starts_at_image_base() {
        let frame = Trapframe::user_entry();
        assert_eq!(frame.pc, USER_BASE);
        assert!(frame.status.contains(StatusFlags::SPIE));
        assert!(!frame.status.contains(StatusFlags::SPP));
    }

    #[test]
    fn idle_resume_is_a_supervisor_frame() {
        let mut resume = Resume::Idle;
        let frame = resume.take();
        assert!(frame.status.contains(StatusFlags::SPP | StatusFlags::SIE));
        assert!(matches!(resume, Resume::Running));
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn double_schedule_is_fatal() {
        let mut resume = Resume::UserEntry;
        let _ = resume.take();
        let _ = resume.take();
    }
}
