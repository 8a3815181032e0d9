//! Process syscalls: introspection, creation, duplication, replacement,
//! waiting, and termination.

use meson_core::kinfo;
use meson_syscall::{ARG_MAX, ARGV_MAX, ExecArgs, PsInfo, WAIT_ERR_NO_CHILD};

use crate::config::{PROCS_MAX, TIME_SLICE_TICKS};
use crate::kernel::Kernel;
use crate::proc::{ProcState, WaitReason, wait_reason_code};
use crate::services::{FileSystem, Services, catalog_lookup};
use crate::syscall::{Flow, UserAccess, UserPtr};
use crate::trap::Trapframe;

impl<S: Services, F: FileSystem> Kernel<S, F> {
    /// `exit()` — terminate the caller. Never returns to it.
    pub(crate) fn sys_exit(&mut self, frame: &mut Trapframe) -> Flow {
        self.exit_current(frame);
        Flow::NoAdvance
    }

    /// `ps(index, &info)` — copy the process-table entry at a slot index.
    /// Fails once the index runs past the table, which is how the `ps`
    /// application detects the end.
    pub(crate) fn sys_ps(&mut self, frame: &mut Trapframe) -> Flow {
        let index = frame.a0 as i32;
        if index < 0 || index as usize >= PROCS_MAX {
            frame.set_result(-1);
            return Flow::Advance;
        }

        let info = {
            let slot = &self.table.slots[index as usize];
            PsInfo {
                pid: slot.pid,
                parent_pid: slot.parent,
                state: slot.state.code(),
                wait_reason: wait_reason_code(slot.state),
                name: slot.name,
                run_ticks: slot.run_ticks,
                schedule_count: slot.schedule_count,
            }
        };

        let Ok(ptr) = UserPtr::<PsInfo>::new(frame.a1) else {
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

    /// `spawn(app_id)` — create a process from the built-in catalog. The
    /// caller becomes its parent. Table exhaustion is an ordinary failure.
    pub(crate) fn sys_spawn(&mut self, frame: &mut Trapframe) -> Flow {
        let app_id = frame.a0 as i32;
        let parent = self.current_pid();

        let result = match catalog_lookup(self.catalog, app_id).copied() {
            Some(app) => self.create_process(app.image, app.name, parent).unwrap_or(-1),
            None => -1,
        };
        frame.set_result(result);
        Flow::Advance
    }

    /// `fork()` — duplicate the caller. The parent gets the child pid; the
    /// child's spliced frame observes 0.
    pub(crate) fn sys_fork(&mut self, frame: &mut Trapframe) -> Flow {
        let child = self.fork_current(frame);
        frame.set_result(child);
        Flow::Advance
    }

    /// `exec(app_id, &args)` — replace the caller's image in place.
    ///
    /// The argument block is copied in before anything is torn down, so a
    /// faulting pointer fails the call with the old image intact. On
    /// success the frame restarts at the user base; the old program's saved
    /// pc is gone along with its pages.
    pub(crate) fn sys_exec(&mut self, frame: &mut Trapframe) -> Flow {
        let Some(app) = catalog_lookup(self.catalog, frame.a0 as i32).copied() else {
            frame.set_result(-1);
            return Flow::Advance;
        };

        let args = if frame.a1 != 0 {
            let Ok(ptr) = UserPtr::<ExecArgs>::new(frame.a1) else {
                frame.set_result(-1);
                return Flow::Advance;
            };
            let space = self.table.slots[self.current]
                .space
                .as_ref()
                .expect("calling process has no address space");
            let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
            match access.read_record(ptr) {
                Ok(args) => sanitize_args(args),
                Err(_) => {
                    drop(access);
                    frame.set_result(-1);
                    return Flow::Advance;
                }
            }
        } else {
            ExecArgs::empty()
        };

        // Commit point: discard the old user image, keeping the kernel and
        // device mappings, and load the new one at the user base.
        let mut space = self.table.slots[self.current]
            .space
            .take()
            .expect("calling process has no address space");
        space.free_user_pages(&mut self.alloc);
        space.load_image(&mut self.alloc, app.image);

        let slot = &mut self.table.slots[self.current];
        slot.space = Some(space);
        slot.set_name(app.name);
        slot.args = args;
        slot.wait_pid = 0;
        slot.time_slice = TIME_SLICE_TICKS;
        slot.run_ticks = 0;

        kinfo!("proc: pid {} exec {}", slot.pid, app.name);

        // A successful exec must not resume the old program's next
        // instruction — it no longer exists. Restart at the image base.
        *frame = Trapframe::user_entry();
        Flow::NoAdvance
    }

    /// `getargs(&args)` — copy the caller's exec argument block out.
    pub(crate) fn sys_getargs(&mut self, frame: &mut Trapframe) -> Flow {
        let Ok(ptr) = UserPtr::<ExecArgs>::new(frame.a0) else {
            frame.set_result(-1);
            return Flow::Advance;
        };

        let args = self.table.slots[self.current].args;
        let space = self.table.slots[self.current]
            .space
            .as_ref()
            .expect("calling process has no address space");
        let mut access = UserAccess::enter(&mut self.status, space, self.alloc.window());
        let result = match access.write_record(ptr, &args) {
            Ok(()) => 0,
            Err(_) => -1,
        };
        drop(access);

        frame.set_result(result);
        Flow::Advance
    }

    /// `waitpid(target)` — collect an exited child.
    ///
    /// With no matching child at all (exact pid or the wildcard), fails
    /// immediately — there is nothing to wait for. With a matching zombie,
    /// reclaims exactly that slot and returns its pid. Otherwise parks the
    /// caller until a matching child exits and re-executes.
    pub(crate) fn sys_waitpid(&mut self, frame: &mut Trapframe) -> Flow {
        let target = frame.a0 as i32;
        let me = self.current_pid();

        let mut has_match = false;
        let mut zombie: Option<usize> = None;
        for (index, slot) in self.table.slots.iter().enumerate() {
            if slot.state == ProcState::Unused || slot.parent != me {
                continue;
            }
            if target != meson_syscall::WAIT_ANY && slot.pid != target {
                continue;
            }
            has_match = true;
            if slot.state == ProcState::Exited {
                zombie = Some(index);
                break;
            }
        }

        if !has_match {
            frame.set_result(WAIT_ERR_NO_CHILD);
            return Flow::Advance;
        }

        if let Some(index) = zombie {
            let child_pid = self.table.slots[index].pid;
            self.reclaim(index);
            frame.set_result(child_pid);
            return Flow::Advance;
        }

        let slot = &mut self.table.slots[self.current];
        slot.state = ProcState::Waiting(WaitReason::ChildExit);
        slot.wait_pid = target;
        self.schedule(frame);
        Flow::NoAdvance
    }

    /// `kill(target)` — forced termination with per-cause error codes.
    pub(crate) fn sys_kill(&mut self, frame: &mut Trapframe) -> Flow {
        let target = frame.a0 as i32;
        match self.kill_process(frame, target) {
            Some(code) => {
                frame.set_result(code);
                Flow::Advance
            }
            // Self-kill: the frame now belongs to another process.
            None => Flow::NoAdvance,
        }
    }
}

/// Clamps a user-supplied argument block to its declared limits and
/// guarantees every slot is NUL-terminated.
fn sanitize_args(mut args: ExecArgs) -> ExecArgs {
    args.argc = args.argc.clamp(0, ARGV_MAX as i32);
    for arg in &mut args.argv {
        arg[ARG_MAX - 1] = 0;
    }
    args
}
