//! Syscall dispatch tests: introspection, console I/O, exec, and the
//! user-memory access bracket.

use meson_core::addr::PAGE_SIZE;
use meson_syscall::{self as abi, ExecArgs, KernelInfo, PsInfo, TimeSpec};

use super::harness::{Machine, WORKER_IMAGE};
use crate::config::{KERNEL_BASE, PROCS_MAX, USER_BASE};
use crate::trap::StatusFlags;

const INFO_PTR: u32 = USER_BASE + 0x100;

#[test]
fn ps_reports_slots_by_index() {
    let mut m = Machine::boot(256);
    assert_eq!(m.syscall(abi::SYS_PS, 1, INFO_PTR, 0), 0);

    let info: PsInfo = m.read_user_record(INFO_PTR);
    assert_eq!(info.pid, 1);
    assert_eq!(info.parent_pid, 0);
    assert_eq!(info.state, abi::PROC_STATE_RUNNABLE);
    assert_eq!(info.wait_reason, abi::WAIT_REASON_NONE);
    assert_eq!(&info.name[..5], b"shell");
}

#[test]
fn ps_unused_slot_reads_as_zeroes_and_range_ends_scan() {
    let mut m = Machine::boot(256);
    assert_eq!(m.syscall(abi::SYS_PS, 5, INFO_PTR, 0), 0);
    let info: PsInfo = m.read_user_record(INFO_PTR);
    assert_eq!(info.pid, 0);
    assert_eq!(info.state, abi::PROC_STATE_UNUSED);

    assert_eq!(m.syscall(abi::SYS_PS, PROCS_MAX as u32, INFO_PTR, 0), -1);
    assert_eq!(m.syscall(abi::SYS_PS, u32::MAX, INFO_PTR, 0), -1);
}

#[test]
fn ps_rejects_kernel_and_unmapped_pointers() {
    let mut m = Machine::boot(256);
    assert_eq!(m.syscall(abi::SYS_PS, 1, KERNEL_BASE + 0x1000, 0), -1);
    // Mapped image is two pages; the third page faults recoverably.
    assert_eq!(m.syscall(abi::SYS_PS, 1, USER_BASE + 3 * PAGE_SIZE, 0), -1);
    assert!(!m.kernel.is_halted());
}

#[test]
fn sum_bit_is_narrow_outside_the_access_bracket() {
    let mut m = Machine::boot(256);
    assert!(!m.kernel.status.contains(StatusFlags::SUM));
    m.syscall(abi::SYS_PS, 1, INFO_PTR, 0);
    assert!(
        !m.kernel.status.contains(StatusFlags::SUM),
        "guard must narrow access on every exit path"
    );
    // The error path restores it too.
    m.syscall(abi::SYS_PS, 1, USER_BASE + 3 * PAGE_SIZE, 0);
    assert!(!m.kernel.status.contains(StatusFlags::SUM));
}

#[test]
fn kernel_info_reports_build_constants() {
    let mut m = Machine::boot(256);
    assert_eq!(m.syscall(abi::SYS_KERNEL_INFO, INFO_PTR, 0, 0), 0);

    let info: KernelInfo = m.read_user_record(INFO_PTR);
    assert_eq!(&info.version[..5], b"0.1.0");
    assert_eq!(info.page_size, PAGE_SIZE);
    assert_eq!(info.kernel_base, KERNEL_BASE);
    assert_eq!(info.user_base, USER_BASE);
    assert_eq!(info.proc_max, PROCS_MAX as u32);
    assert_eq!(info.total_pages, 255, "one page of a 256-page window is bitmap");
    assert_eq!(info.time_slice_ticks, 3);
}

#[test]
fn bitmap_syscall_walks_allocation_state() {
    let mut m = Machine::boot(256);
    // Index 0 backs the init address space; far-end pages are free.
    assert_eq!(m.syscall(abi::SYS_BITMAP, 0, 0, 0), 1);
    assert_eq!(m.syscall(abi::SYS_BITMAP, 200, 0, 0), 0);
    assert_eq!(m.syscall(abi::SYS_BITMAP, 255, 0, 0), -1);
}

#[test]
fn gettime_splits_the_clock_reading() {
    let mut m = Machine::boot(256);
    m.kernel.services.now = 5_000_000_123 + (u64::from(u32::MAX) + 1) * 1_000_000_000;
    assert_eq!(m.syscall(abi::SYS_GETTIME, INFO_PTR, 0, 0), 0);

    let spec: TimeSpec = m.read_user_record(INFO_PTR);
    let sec = u64::from(spec.sec_hi) << 32 | u64::from(spec.sec_lo);
    assert_eq!(sec, u64::from(u32::MAX) + 1 + 5);
    assert_eq!(spec.nsec, 123);
}

#[test]
fn putchar_reaches_the_console() {
    let mut m = Machine::boot(256);
    for &b in b"ok" {
        m.syscall(abi::SYS_PUTCHAR, u32::from(b), 0, 0);
    }
    assert_eq!(m.kernel.services.console_out, b"ok");
}

#[test]
fn getchar_drains_queued_input_in_order() {
    let mut m = Machine::boot(256);
    m.kernel.services.console_in.extend(b"hi".iter().copied());
    assert_eq!(m.syscall(abi::SYS_GETCHAR, 0, 0, 0), i32::from(b'h'));
    assert_eq!(m.syscall(abi::SYS_GETCHAR, 0, 0, 0), i32::from(b'i'));
}

#[test]
#[should_panic(expected = "undefined system call")]
fn unknown_syscall_is_fatal() {
    let mut m = Machine::boot(256);
    m.syscall(4096, 0, 0, 0);
}

#[test]
fn exec_replaces_image_and_restarts_at_user_base() {
    let mut m = Machine::boot(256);
    let used_with_shell = m.kernel.used_pages();

    // The shell image holds two user pages; the worker image holds one.
    let mut args = ExecArgs::empty();
    args.argc = 1;
    args.argv[0][..3].copy_from_slice(b"-a\0");
    m.write_user_record(INFO_PTR, &args);

    m.frame.pc = USER_BASE + 0x40;
    m.syscall(abi::SYS_EXEC, abi::APP_ID_PS as u32, INFO_PTR, 0);

    let slot = m.kernel.slot(1);
    assert_eq!(&slot.name[..2], b"ps");
    assert_eq!(slot.space.as_ref().unwrap().user_pages(), 1);
    assert_eq!(slot.args.argc, 1);
    assert_eq!(slot.run_ticks, 0);

    // One page fewer than before: the two old pages went back to the
    // bitmap and one new page came out.
    assert_eq!(m.kernel.used_pages(), used_with_shell - 1);

    // The old program's next instruction is gone; execution restarts at
    // the image base.
    assert_eq!(m.frame.pc, USER_BASE);
    assert_eq!(m.frame.status, crate::trap::Trapframe::user_entry().status);

    // The new image's bytes are in place.
    let mut first = [0u8; 4];
    m.read_user(USER_BASE, &mut first);
    assert_eq!(first, [WORKER_IMAGE[0]; 4]);
}

#[test]
fn exec_with_unknown_app_keeps_the_old_image() {
    let mut m = Machine::boot(256);
    let pc_before = m.frame.pc;
    assert_eq!(m.syscall(abi::SYS_EXEC, 999, 0, 0), -1);
    let slot = m.kernel.slot(1);
    assert_eq!(&slot.name[..5], b"shell");
    assert_eq!(slot.space.as_ref().unwrap().user_pages(), 2);
    assert_eq!(m.frame.pc, pc_before + 4, "ordinary error return");
}

#[test]
fn getargs_round_trips_the_exec_block() {
    let mut m = Machine::boot(256);
    let mut args = ExecArgs::empty();
    args.argc = 2;
    args.argv[0][..4].copy_from_slice(b"foo\0");
    args.argv[1][..4].copy_from_slice(b"bar\0");
    m.write_user_record(INFO_PTR, &args);
    m.syscall(abi::SYS_EXEC, abi::APP_ID_PS as u32, INFO_PTR, 0);

    // The new image reads its arguments back.
    let out_ptr = USER_BASE + 0x200;
    assert_eq!(m.syscall(abi::SYS_GETARGS, out_ptr, 0, 0), 0);
    let read_back: ExecArgs = m.read_user_record(out_ptr);
    assert_eq!(read_back.argc, 2);
    assert_eq!(&read_back.argv[0][..4], b"foo\0");
    assert_eq!(&read_back.argv[1][..4], b"bar\0");
}
