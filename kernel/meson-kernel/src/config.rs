//! Compile-time kernel configuration.
//!
//! Single source of truth for every build constant; the `kernel_info`
//! syscall reports most of these to user space.

use meson_mm::MmioWindow;

/// Kernel version string.
pub const VERSION: &str = "0.1.0";

/// Number of process-table slots, including the idle slot.
pub const PROCS_MAX: usize = 64;

/// Scheduler quantum in timer ticks.
pub const TIME_SLICE_TICKS: u32 = 3;

/// Size of one per-process kernel stack in bytes.
pub const KERNEL_STACK_SIZE: usize = 8192;

/// Base of the kernel image and the identity mapping.
pub const KERNEL_BASE: u32 = 0x8020_0000;

/// Virtual base where every user image is loaded.
pub const USER_BASE: u32 = 0x0100_0000;

/// Pid of the init process, the first process created at boot. It cannot be
/// killed, and its exit shuts the system down.
pub const INIT_PID: i32 = 1;

/// Timer interrupt interval in milliseconds.
pub const TIMER_INTERVAL_MS: u32 = 100;

/// Width of one instruction; the trap-return path advances the saved pc by
/// this much after a completed syscall.
pub const INSN_SIZE: u32 = 4;

/// Virtio block-device MMIO window: eight device slots of one page each.
pub const VIRTIO_MMIO: MmioWindow = MmioWindow {
    base: 0x1000_1000,
    pages: 8,
};

/// Goldfish RTC MMIO window.
pub const RTC_MMIO: MmioWindow = MmioWindow {
    base: 0x0010_1000,
    pages: 1,
};

/// Device windows mapped read/write into every address space.
pub const MMIO_WINDOWS: [MmioWindow; 2] = [VIRTIO_MMIO, RTC_MMIO];

/// Capacity of the console input queue in bytes.
pub const CONSOLE_INPUT_CAP: usize = 64;
