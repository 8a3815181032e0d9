//! Wall-clock query, forwarded to the clock collaborator.

use meson_syscall::TimeSpec;

use crate::kernel::Kernel;
use crate::services::{FileSystem, Services};
use crate::syscall::{Flow, UserAccess, UserPtr};
use crate::trap::Trapframe;

const NANOS_PER_SEC: u64 = 1_000_000_000;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// `gettime(&spec)` — read the monotonic wall clock and copy it out as
    /// split seconds plus nanoseconds.
    pub(crate) fn sys_gettime(&mut self, frame: &mut Trapframe) -> Flow {
        let now = self.services.now_ns();
        let sec = now / NANOS_PER_SEC;
        let spec = TimeSpec {
            sec_lo: sec as u32,
            sec_hi: (sec >> 32) as u32,
            nsec: (now % NANOS_PER_SEC) as u32,
        };

        let Ok(ptr) = UserPtr::<TimeSpec>::new(frame.a0) else {
            frame.set_result(-1);
            return Flow::Advance;
        };
        let space = self.table.slots[self.current]
            .space
            .as_ref()
            .expect("calling process has no address space");
        let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
        let result = match access.write_record(ptr, &spec) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        drop(access);

        frame.set_result(result);
        Flow::Advance
    }
}
