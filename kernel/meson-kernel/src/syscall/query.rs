//! Kernel introspection: the page-bitmap debug view and the kernel-info
//! record.

use meson_core::addr::PAGE_SIZE;
use meson_syscall::{KERNEL_VERSION_MAX, KernelInfo};

use crate::config::{
    KERNEL_BASE, KERNEL_STACK_SIZE, PROCS_MAX, TIME_SLICE_TICKS, TIMER_INTERVAL_MS, USER_BASE,
    VERSION,
};
use crate::kernel::Kernel;
use crate::services::{FileSystem, Services};
use crate::syscall::{Flow, UserAccess, UserPtr};
use crate::trap::Trapframe;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// `bitmap(index)` — allocation state of one physical page: 0 free,
    /// 1 allocated, -1 past the end. The shell's `bitmap` command walks
    /// indices until it sees -1.
    pub(crate) fn sys_bitmap(&mut self, frame: &mut Trapframe) -> Flow {
        frame.set_result(self.alloc.page_state(frame.a0 as i32));
        Flow::Advance
    }

    /// `kernel_info(&info)` — copy the fixed kernel-facts record out.
    pub(crate) fn sys_kernel_info(&mut self, frame: &mut Trapframe) -> Flow {
        let mut version = [0u8; KERNEL_VERSION_MAX];
        let len = VERSION.len().min(KERNEL_VERSION_MAX - 1);
        version[..len].copy_from_slice(&VERSION.as_bytes()[..len]);

        let info = KernelInfo {
            version,
            total_pages: self.alloc.managed_pages(),
            page_size: PAGE_SIZE,
            kernel_base: KERNEL_BASE,
            user_base: USER_BASE,
            proc_max: PROCS_MAX as u32,
            kernel_stack_bytes: KERNEL_STACK_SIZE as u32,
            time_slice_ticks: TIME_SLICE_TICKS,
            timer_interval_ms: TIMER_INTERVAL_MS,
        };

        let Ok(ptr) = UserPtr::<KernelInfo>::new(frame.a0) else {
            frame.set_result(-1);
            return Flow::Advance;
        };
        let space = self.table.slots[self.current]
            .space
            .as_ref()
            .expect("calling process has no address space");
        let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
        let result = match access.write_record(ptr, &info) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        drop(access);

        frame.set_result(result);
        Flow::Advance
    }
}
