//! The kernel object: every piece of state the core owns, and the trap
//! entry point that mutates it.
//!
//! There is exactly one mutator of kernel state at any instant — the
//! currently trapped-into-supervisor-mode code. That invariant is expressed
//! directly: all state hangs off one [`Kernel`] value and every operation
//! takes `&mut self`. Interrupts are masked for the full duration of a
//! trap, so nothing here ever races.

use meson_core::addr::{PhysAddr, VirtAddr};
use meson_core::{kdebug, kinfo};
use meson_mm::{PageAllocator, PhysWindow, SpaceLayout};

use crate::config::{
    INIT_PID, KERNEL_BASE, MMIO_WINDOWS, PROCS_MAX, TIME_SLICE_TICKS, USER_BASE,
};
use crate::console::InputQueue;
use crate::proc::{ProcState, ProcessTable, WaitReason};
use crate::services::{AppImage, FileSystem, Services, catalog_lookup};
use crate::syscall::Flow;
use crate::trap::{StatusFlags, TrapCause, Trapframe};

/// The kernel core.
///
/// Generic over the platform [`Services`] and the [`FileSystem`]
/// collaborator so hosts and tests can supply their own.
pub struct Kernel<S: Services, F: FileSystem> {
    /// Platform services: console, timer, clock.
    pub services: S,
    /// The filesystem collaborator.
    pub fs: F,
    /// Built-in application images for spawn and exec.
    pub(crate) catalog: &'static [AppImage],
    /// The physical page allocator (and, through it, the linear window).
    pub(crate) alloc: PageAllocator,
    /// The fixed regions every address space maps.
    pub(crate) layout: SpaceLayout<'static>,
    /// The process table.
    pub(crate) table: ProcessTable,
    /// Slot index of the running process.
    pub(crate) current: usize,
    /// Root table of the installed address space (the translation
    /// register).
    pub(crate) active_root: PhysAddr,
    /// Top of the running process's kernel stack (the trap-entry scratch
    /// register).
    pub(crate) active_kernel_sp: usize,
    /// The live supervisor status word.
    pub(crate) status: StatusFlags,
    /// Set when the current quantum expires; consumed at the trap-return
    /// boundary.
    pub(crate) resched: bool,
    /// Timer ticks since boot.
    pub(crate) ticks: u64,
    /// Console input FIFO.
    pub(crate) input: InputQueue,
    /// Set once the init process exits; no further traps are serviced.
    pub(crate) halted: bool,
}

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// Builds the kernel over the free-RAM window discovered at boot,
    /// claiming slot 0 for the idle process.
    ///
    /// `ram` must start at or above the kernel base, page-aligned; the
    /// identity mapping of every address space covers the kernel image
    /// through the end of this window.
    pub fn new(ram: PhysWindow, services: S, fs: F, catalog: &'static [AppImage]) -> Self {
        assert!(
            ram.base().as_u32() >= KERNEL_BASE,
            "free RAM below the kernel base"
        );

        let alloc = PageAllocator::new(ram);
        let layout = SpaceLayout {
            kernel_base: VirtAddr::new(KERNEL_BASE),
            kernel_end: VirtAddr::new(ram.end().as_u32()),
            mmio: &MMIO_WINDOWS,
            user_base: VirtAddr::new(USER_BASE),
        };

        let mut table = ProcessTable::new();

        // Slot 0 is the idle process for the machine's lifetime. It never
        // terminates and is only run when nothing else is Runnable.
        let idle = &mut table.slots[0];
        idle.pid = 0;
        idle.state = ProcState::Runnable;
        idle.resume = crate::trap::Resume::Idle;
        idle.set_name("idle");

        kinfo!(
            "kernel: {} pages of free RAM, {} process slots",
            alloc.managed_pages(),
            PROCS_MAX
        );

        Self {
            services,
            fs,
            catalog,
            alloc,
            layout,
            table,
            current: 0,
            active_root: PhysAddr::zero(),
            // Established by boot_init: kernel stacks have no stable
            // address until the kernel sits at its final location.
            active_kernel_sp: 0,
            status: StatusFlags::SIE,
            resched: false,
            ticks: 0,
            input: InputQueue::new(),
            halted: false,
        }
    }

    /// Creates the init process from the catalog and schedules it.
    ///
    /// Returns the init pid. Panics if the image is missing or the (empty)
    /// table cannot hold it — a boot that cannot start init is not a
    /// working system.
    pub fn boot_init(&mut self, frame: &mut Trapframe, app_id: i32) -> i32 {
        // The trap scratch register tracks the running process's kernel
        // stack; the boot context runs on the idle slot's.
        self.active_kernel_sp = self.table.slots[0].stack.top();

        let app = *catalog_lookup(self.catalog, app_id).expect("init image missing from catalog");
        let pid = self
            .create_process(app.image, app.name, 0)
            .expect("no slot for the init process");
        assert_eq!(pid, INIT_PID, "init did not land in the expected slot");
        kinfo!("boot: init is pid {pid} ({})", app.name);
        self.schedule(frame);
        pid
    }

    /// Trap entry point. `frame` holds the trapped register snapshot on the
    /// way in and the snapshot to resume on the way out — which belongs to
    /// a different process whenever the trap rescheduled.
    pub fn handle_trap(&mut self, frame: &mut Trapframe, cause: TrapCause) {
        if self.halted {
            return;
        }

        match cause {
            TrapCause::EnvironmentCallFromUser => {
                // Re-derive the trapping process from the kernel stack
                // pointer range instead of trusting `current`.
                let slot = self
                    .table
                    .owner_of_kernel_sp(self.active_kernel_sp)
                    .expect("trap from an unknown kernel stack");
                debug_assert_eq!(slot, self.current);
                self.current = slot;

                match self.dispatch_syscall(frame) {
                    Flow::Advance => frame.advance_pc(),
                    Flow::NoAdvance => {}
                }
            }
            TrapCause::TimerInterrupt => self.handle_timer(frame),
            fault => panic!(
                "unexpected trap: {:?} (cause {:#x}) at pc {:#x}",
                fault,
                fault.code(),
                frame.pc
            ),
        }
    }

    /// Timer interrupt: re-arm the deadline first, then poll the console,
    /// then charge the running process's quantum. The resched flag is
    /// consumed here, at the trap-return boundary — never mid-handler.
    fn handle_timer(&mut self, frame: &mut Trapframe) {
        self.services.timer_rearm();
        self.poll_console();

        self.ticks += 1;
        let slot = &mut self.table.slots[self.current];
        slot.run_ticks += 1;
        if slot.time_slice > 0 {
            slot.time_slice -= 1;
        }
        if slot.time_slice == 0 {
            self.resched = true;
        }
        // The idle process yields to any runnable work immediately.
        if self.current == 0 {
            self.resched = true;
        }

        if self.resched {
            self.resched = false;
            self.schedule(frame);
        }
    }

    /// Pulls pending console bytes into the input queue and wakes
    /// processes blocked on console input if anything is available.
    pub(crate) fn poll_console(&mut self) {
        while !self.input.is_full() {
            match self.services.console_poll() {
                Some(byte) => {
                    let _ = self.input.push(byte);
                }
                None => break,
            }
        }

        if !self.input.is_empty() {
            for slot in &mut self.table.slots {
                if slot.state == ProcState::Waiting(WaitReason::ConsoleInput) {
                    slot.state = ProcState::Runnable;
                }
            }
        }
    }

    /// Orderly shutdown, triggered by the init process exiting.
    pub(crate) fn shutdown(&mut self) {
        kinfo!("kernel: init exited, shutting down after {} ticks", self.ticks);
        self.halted = true;
    }

    /// Returns the running process's pid.
    pub fn current_pid(&self) -> i32 {
        self.table.slots[self.current].pid
    }

    /// Returns `true` once the system has shut down.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns ticks since boot.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Read-only view of a process slot, for introspection and tests.
    pub fn slot(&self, index: usize) -> &crate::proc::Process {
        &self.table.slots[index]
    }

    /// Returns the number of managed physical pages currently allocated.
    pub fn used_pages(&self) -> u32 {
        self.alloc.used_pages()
    }

    /// Logs a compact table summary at debug level.
    pub fn log_table(&self) {
        for slot in &self.table.slots {
            if slot.state != ProcState::Unused {
                kdebug!(
                    "  pid {} parent {} state {:?} slice {} runs {}",
                    slot.pid,
                    slot.parent,
                    slot.state,
                    slot.time_slice,
                    slot.schedule_count
                );
            }
        }
    }
}

/// Re-arms a freshly scheduled slot's quantum.
pub(crate) fn refresh_quantum(slot: &mut crate::proc::Process) {
    slot.time_slice = TIME_SLICE_TICKS;
}
