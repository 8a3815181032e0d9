//! Scheduler tests: quantum accounting, preemption, round-robin order, and
//! the idle process.

use meson_syscall::{self as abi};

use super::harness::Machine;
use crate::config::TIME_SLICE_TICKS;
use crate::proc::ProcState;

#[test]
fn quantum_expiry_preempts_to_the_next_runnable() {
    let mut m = Machine::boot(256);
    let other = m.syscall(abi::SYS_SPAWN, abi::APP_ID_PS as u32, 0, 0);

    // Two ticks charge the quantum without exhausting it.
    m.ticks(TIME_SLICE_TICKS - 1);
    assert_eq!(m.current(), 1);
    assert_eq!(m.kernel.slot(1).time_slice, 1);

    // The third tick exhausts it; the next scheduling point picks the
    // other runnable process.
    m.tick();
    assert_eq!(m.current(), other);
    assert_eq!(
        m.kernel.slot(other as usize).time_slice,
        TIME_SLICE_TICKS,
        "fresh quantum on switch-in"
    );
}

#[test]
fn lone_runnable_process_gets_its_quota_rearmed() {
    let mut m = Machine::boot(256);
    // No other process exists: after the quantum expires, init simply
    // continues with a fresh quota.
    m.ticks(TIME_SLICE_TICKS);
    assert_eq!(m.current(), 1);
    assert_eq!(m.kernel.slot(1).time_slice, TIME_SLICE_TICKS);
}

#[test]
fn round_robin_rotates_in_slot_order() {
    let mut m = Machine::boot(256);
    let b = m.syscall(abi::SYS_SPAWN, abi::APP_ID_PS as u32, 0, 0);
    let c = m.syscall(abi::SYS_SPAWN, abi::APP_ID_PS as u32, 0, 0);

    let mut order = Vec::new();
    for _ in 0..3 {
        m.ticks(TIME_SLICE_TICKS);
        order.push(m.current());
    }
    assert_eq!(order, vec![b, c, 1]);
}

#[test]
fn run_ticks_and_schedule_counts_accumulate() {
    let mut m = Machine::boot(256);
    let other = m.syscall(abi::SYS_SPAWN, abi::APP_ID_PS as u32, 0, 0);

    m.ticks(TIME_SLICE_TICKS); // init runs out, other runs
    m.ticks(TIME_SLICE_TICKS); // other runs out, init back

    assert_eq!(m.kernel.slot(1).run_ticks, TIME_SLICE_TICKS);
    assert_eq!(m.kernel.slot(other as usize).run_ticks, TIME_SLICE_TICKS);
    // Scheduled at boot and again after the other's quantum.
    assert_eq!(m.kernel.slot(1).schedule_count, 2);
}

#[test]
fn idle_runs_when_nothing_is_runnable_and_yields_on_wake() {
    let mut m = Machine::boot(256);

    // Init blocks on console input with nothing pending.
    let result_frame_pc = m.frame.pc;
    m.syscall(abi::SYS_GETCHAR, 0, 0, 0);
    assert_eq!(m.current(), 0, "idle takes over");
    assert_eq!(
        m.kernel.slot(1).state,
        ProcState::Waiting(crate::proc::WaitReason::ConsoleInput)
    );

    // A byte arrives; the timer poll wakes init and idle yields at once.
    m.kernel.services.console_in.push_back(b'x');
    m.tick();
    assert_eq!(m.current(), 1);

    // The woken process re-executes the trapped call and gets the byte.
    assert_eq!(m.frame.pc, result_frame_pc, "pc still on the call");
    assert_eq!(m.retrap(), i32::from(b'x'));
}

#[test]
fn timer_rearms_before_any_scheduling_work() {
    let mut m = Machine::boot(256);
    m.ticks(5);
    assert_eq!(m.kernel.services.rearms, 5);
    assert_eq!(m.kernel.ticks(), 5);
}
