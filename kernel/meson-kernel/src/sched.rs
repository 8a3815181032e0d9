//! Round-robin scheduling and the context switch.
//!
//! Selection scans the table starting just after the current slot and takes
//! the first Runnable entry with a positive pid; pid 0 is the idle process,
//! run only when nothing else can. The switch itself is
//! register-state-agnostic: park the outgoing frame in its slot, install
//! the incoming address space and kernel stack, and materialize the
//! incoming resume state into the live frame. Who gets switched to is
//! entirely this module's decision; how a frame resumes is entirely
//! [`crate::trap::Resume`]'s.

use meson_core::kdebug;

use crate::config::PROCS_MAX;
use crate::kernel::{Kernel, refresh_quantum};
use crate::proc::ProcState;
use crate::services::{FileSystem, Services};
use crate::trap::{Resume, Trapframe};

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// Reschedules: reaps exited orphans, picks the next Runnable process,
    /// and switches to it. With no candidate, the idle process runs until
    /// the next interrupt. Picking the current process again only refreshes
    /// its quantum.
    pub(crate) fn schedule(&mut self, frame: &mut Trapframe) {
        self.reap_orphans();

        let next = self.pick_next();
        match next {
            Some(index) if index == self.current => {
                refresh_quantum(&mut self.table.slots[index]);
            }
            Some(index) => self.switch_to(frame, index),
            None => {
                // Nothing runnable: hand the core to the idle loop.
                if self.current != 0 {
                    self.switch_to(frame, 0);
                }
            }
        }
    }

    /// First Runnable slot with a positive pid, scanning round-robin from
    /// just after the current slot. Returns `None` when only the idle
    /// process could run.
    fn pick_next(&self) -> Option<usize> {
        (1..=PROCS_MAX)
            .map(|offset| (self.current + offset) % PROCS_MAX)
            .find(|&index| {
                let slot = &self.table.slots[index];
                slot.pid > 0 && slot.state == ProcState::Runnable
            })
    }

    /// Performs the switch to `index`: saves the outgoing frame, installs
    /// the incoming process's address space and kernel stack, and loads its
    /// resume state.
    fn switch_to(&mut self, frame: &mut Trapframe, index: usize) {
        debug_assert_ne!(index, self.current);

        let incoming = &self.table.slots[index];
        // Scheduling anything but a Runnable process (or idle) means the
        // lifecycle bookkeeping is broken — most notably, a process that
        // killed itself must never run again.
        assert!(
            incoming.state == ProcState::Runnable,
            "scheduled pid {} in state {:?}",
            incoming.pid,
            incoming.state
        );

        // Park the outgoing register snapshot in its slot.
        self.table.slots[self.current].resume = Resume::Frame(*frame);

        // Install the incoming address space. The idle slot has none and
        // runs under whichever space is live; the kernel region is mapped
        // identically in all of them.
        let slot = &mut self.table.slots[index];
        if let Some(space) = slot.space.as_ref() {
            self.active_root = space.root();
        }
        self.active_kernel_sp = slot.stack.top();

        slot.schedule_count += 1;
        refresh_quantum(slot);
        *frame = slot.resume.take();

        kdebug!(
            "sched: pid {} -> pid {}",
            self.table.slots[self.current].pid,
            self.table.slots[index].pid
        );
        self.current = index;
    }

    /// Reclaims every Exited slot with no live parent. Called from every
    /// table scan point: create, fork, and reschedule.
    pub(crate) fn reap_orphans(&mut self) {
        for index in 0..PROCS_MAX {
            let slot = &self.table.slots[index];
            if slot.state == ProcState::Exited && slot.parent == 0 {
                self.reclaim(index);
            }
        }
    }
}
