//! Test doubles and the machine harness.

use std::collections::VecDeque;

use meson_core::addr::{PAGE_SIZE, PhysAddr, VirtAddr};
use meson_mm::PhysWindow;
use meson_syscall::{self as abi, Dirent, FS_NAME_MAX};

use crate::config::KERNEL_BASE;
use crate::services::{AppImage, FileSystem, Services};
use crate::{Kernel, TrapCause, Trapframe};

/// Two pages of recognizable bytes: the init image.
pub const SHELL_IMAGE: &[u8] = &[0x13; 2 * PAGE_SIZE as usize];
/// A sub-page image for worker processes.
pub const WORKER_IMAGE: &[u8] = &[0x42; 100];

/// The built-in application catalog used by every test.
pub static CATALOG: &[AppImage] = &[
    AppImage {
        id: abi::APP_ID_SHELL,
        name: "shell",
        image: SHELL_IMAGE,
    },
    AppImage {
        id: abi::APP_ID_PS,
        name: "ps",
        image: WORKER_IMAGE,
    },
];

/// Recording platform services double.
#[derive(Default)]
pub struct TestServices {
    /// Bytes written by `putchar`.
    pub console_out: Vec<u8>,
    /// Bytes the console poll will deliver.
    pub console_in: VecDeque<u8>,
    /// Timer re-arm count; one per timer trap.
    pub rearms: u32,
    /// The wall clock the `gettime` test reads.
    pub now: u64,
}

impl Services for TestServices {
    fn console_put(&mut self, byte: u8) {
        self.console_out.push(byte);
    }

    fn console_poll(&mut self) -> Option<u8> {
        self.console_in.pop_front()
    }

    fn timer_rearm(&mut self) {
        self.rearms += 1;
    }

    fn now_ns(&mut self) -> u64 {
        self.now
    }
}

/// Recording filesystem double.
#[derive(Default)]
pub struct TestFs {
    /// Every forwarded call, formatted for assertion.
    pub log: Vec<String>,
    /// Pids whose descriptors were recycled.
    pub recycled: Vec<i32>,
    /// (parent, child) descriptor duplications.
    pub copied: Vec<(i32, i32)>,
    /// When set, `copy_descriptors` refuses and fork must abort.
    pub refuse_copy: bool,
    /// Bytes most recently written through `write`.
    pub written: Vec<u8>,
}

impl FileSystem for TestFs {
    fn open(&mut self, pid: i32, path: &str, flags: u32) -> i32 {
        self.log.push(format!("open {pid} {path} {flags:#x}"));
        3
    }

    fn close(&mut self, pid: i32, fd: i32) -> i32 {
        self.log.push(format!("close {pid} {fd}"));
        0
    }

    fn read(&mut self, pid: i32, fd: i32, buf: &mut [u8]) -> i32 {
        self.log.push(format!("read {pid} {fd} {}", buf.len()));
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = i as u8;
        }
        buf.len() as i32
    }

    fn write(&mut self, pid: i32, fd: i32, buf: &[u8]) -> i32 {
        self.log.push(format!("write {pid} {fd} {}", buf.len()));
        self.written = buf.to_vec();
        buf.len() as i32
    }

    fn mkdir(&mut self, path: &str) -> i32 {
        self.log.push(format!("mkdir {path}"));
        0
    }

    fn readdir(&mut self, path: &str, index: i32) -> Result<Dirent, i32> {
        self.log.push(format!("readdir {path} {index}"));
        if index > 0 {
            return Err(-1);
        }
        let mut name = [0u8; FS_NAME_MAX];
        name[..5].copy_from_slice(b"hello");
        Ok(Dirent {
            name,
            kind: abi::FS_TYPE_FILE,
            size: 11,
        })
    }

    fn unlink(&mut self, path: &str) -> i32 {
        self.log.push(format!("unlink {path}"));
        0
    }

    fn rmdir(&mut self, path: &str) -> i32 {
        self.log.push(format!("rmdir {path}"));
        0
    }

    fn dup2(&mut self, pid: i32, old_fd: i32, new_fd: i32) -> i32 {
        self.log.push(format!("dup2 {pid} {old_fd} {new_fd}"));
        new_fd
    }

    fn resolve(&mut self, path: &str) -> Option<(i32, i32)> {
        self.log.push(format!("resolve {path}"));
        (path != "/missing").then_some((7, 9))
    }

    fn copy_descriptors(&mut self, parent: i32, child: i32) -> i32 {
        if self.refuse_copy {
            return -1;
        }
        self.copied.push((parent, child));
        0
    }

    fn recycle(&mut self, pid: i32) {
        self.recycled.push(pid);
    }
}

/// Fake physical RAM starting at the kernel base.
pub struct TestRam {
    /// Held for its lifetime; reached only through the window.
    _backing: Box<[u64]>,
    window: PhysWindow,
}

impl TestRam {
    pub fn new(pages: u32) -> Self {
        let mut backing = vec![0u64; (pages * PAGE_SIZE) as usize / 8].into_boxed_slice();
        // SAFETY: the boxed slice provides the full byte range, outlives the
        // window, and is only touched through it.
        let window = unsafe {
            PhysWindow::new(
                PhysAddr::new(KERNEL_BASE),
                pages * PAGE_SIZE,
                backing.as_mut_ptr().cast(),
            )
        };
        Self {
            _backing: backing,
            window,
        }
    }
}

/// A kernel plus the one live trapframe — the "CPU registers" — driven the
/// way real trap entry would.
pub struct Machine {
    pub kernel: Box<Kernel<TestServices, TestFs>>,
    pub frame: Trapframe,
    ram: TestRam,
}

impl Machine {
    /// Boots a kernel over `pages` of fake RAM and starts init (the shell
    /// image, pid 1).
    pub fn boot(pages: u32) -> Self {
        let ram = TestRam::new(pages);
        let mut kernel = Box::new(Kernel::new(
            ram.window,
            TestServices::default(),
            TestFs::default(),
            CATALOG,
        ));
        let mut frame = Trapframe::zeroed();
        kernel.boot_init(&mut frame, abi::APP_ID_SHELL);
        Self { kernel, frame, ram }
    }

    /// Issues a syscall trap from the current process and returns `a0`.
    pub fn syscall(&mut self, nr: u32, a0: u32, a1: u32, a2: u32) -> i32 {
        self.frame.a3 = nr;
        self.frame.a0 = a0;
        self.frame.a1 = a1;
        self.frame.a2 = a2;
        self.kernel
            .handle_trap(&mut self.frame, TrapCause::EnvironmentCallFromUser);
        self.frame.a0 as i32
    }

    /// Re-executes whatever trap instruction the live frame points at —
    /// what the hardware does after a blocked process is rescheduled with
    /// its pc still on the call.
    pub fn retrap(&mut self) -> i32 {
        self.kernel
            .handle_trap(&mut self.frame, TrapCause::EnvironmentCallFromUser);
        self.frame.a0 as i32
    }

    /// Delivers one timer interrupt.
    pub fn tick(&mut self) {
        self.kernel
            .handle_trap(&mut self.frame, TrapCause::TimerInterrupt);
    }

    /// Delivers `n` timer interrupts.
    pub fn ticks(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Pid of the process the live frame belongs to.
    pub fn current(&self) -> i32 {
        self.kernel.current_pid()
    }

    /// Reads bytes from the current process's user memory. The range must
    /// stay within one page.
    pub fn read_user(&self, vaddr: u32, out: &mut [u8]) {
        let window = self.ram.window;
        let space = self.kernel.table.slots[self.kernel.current]
            .space
            .as_ref()
            .expect("current process has no space");
        let leaf = space
            .lookup(window, VirtAddr::new(vaddr).align_down(PAGE_SIZE))
            .expect("user page not mapped");
        let offset = vaddr % PAGE_SIZE;
        assert!(offset as usize + out.len() <= PAGE_SIZE as usize);
        window.read_bytes(leaf.paddr() + offset, out);
    }

    /// Writes bytes into the current process's user memory. Same one-page
    /// restriction as [`Self::read_user`].
    pub fn write_user(&mut self, vaddr: u32, bytes: &[u8]) {
        let window = self.ram.window;
        let space = self.kernel.table.slots[self.kernel.current]
            .space
            .as_ref()
            .expect("current process has no space");
        let leaf = space
            .lookup(window, VirtAddr::new(vaddr).align_down(PAGE_SIZE))
            .expect("user page not mapped");
        let offset = vaddr % PAGE_SIZE;
        assert!(offset as usize + bytes.len() <= PAGE_SIZE as usize);
        window.write_bytes(leaf.paddr() + offset, bytes);
    }

    /// Reads a boundary record out of the current process's user memory.
    pub fn read_user_record<T: Copy>(&self, vaddr: u32) -> T {
        let mut value = core::mem::MaybeUninit::<T>::uninit();
        // SAFETY: read_user fills every byte; the boundary records accept
        // any byte pattern.
        unsafe {
            let bytes = core::slice::from_raw_parts_mut(
                value.as_mut_ptr().cast::<u8>(),
                core::mem::size_of::<T>(),
            );
            self.read_user(vaddr, bytes);
            value.assume_init()
        }
    }

    /// Writes a boundary record into the current process's user memory.
    pub fn write_user_record<T: Copy>(&mut self, vaddr: u32, value: &T) {
        // SAFETY: viewing a plain boundary record as bytes is always valid.
        let bytes = unsafe {
            core::slice::from_raw_parts(
                (value as *const T).cast::<u8>(),
                core::mem::size_of::<T>(),
            )
        };
        self.write_user(vaddr, bytes);
    }
}
