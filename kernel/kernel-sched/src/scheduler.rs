//! The round-robin scheduler.
//!
//! One registry of all tasks (an arena of [`Tcb`]s), one ready queue of
//! pids. Quantum length equals static priority; queue order is plain FIFO
//! except that unblocked tasks jump the line.

use crate::context::{SwitchFrame, initial_frame_offset};
use crate::platform::Platform;
use crate::task::{EntryFn, TaskInfo, TaskStatus, Tcb};
use crate::{Pid, PidPool};
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use kernel_alloc::{PageAllocator, Space, VirtualAddressSpace};
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::IrqGuard;
use kernel_vmem::{AddressSpace, PhysMapper};

/// The scheduler: task registry, ready queue and dispatch logic.
///
/// Built once at kernel initialization around the page allocator, the kernel
/// address space and the platform seam. The boot context itself becomes the
/// first task ("main"), and an idle task is spawned immediately so dispatch
/// always has somewhere to go.
pub struct Scheduler<'a, M: PhysMapper, P: Platform> {
    platform: &'a P,
    alloc: &'a PageAllocator,
    aspace: &'a AddressSpace<'a, M>,
    pids: PidPool,
    /// All live tasks, in registration order. This is both the arena and
    /// the all-tasks registry; lookups are linear scans by pid.
    tasks: Vec<Tcb>,
    /// Pids eligible for dispatch, head first. The running task is *not*
    /// queued.
    ready: VecDeque<Pid>,
    current: Pid,
    idle: Pid,
}

impl<'a, M: PhysMapper, P: Platform> Scheduler<'a, M, P> {
    /// Bring up scheduling: adopt the boot context as the `Running` main
    /// task and spawn the idle task.
    ///
    /// `idle_entry` is the idle task's body; it must loop blocking itself
    /// and halting via the platform (see the crate docs). It is spawned like
    /// any other thread and unblocked by `schedule()` whenever the ready
    /// queue runs dry.
    pub fn new(
        platform: &'a P,
        alloc: &'a PageAllocator,
        aspace: &'a AddressSpace<'a, M>,
        main_name: &str,
        main_priority: u8,
        idle_entry: EntryFn,
    ) -> Self {
        let pids = PidPool::new();
        let main_pid = pids.allocate();
        let mut main = Tcb::new(main_pid, main_name, main_priority);
        // Main is already executing on the boot stack; it owns no heap page.
        main.status = TaskStatus::Running;

        let mut sched = Self {
            platform,
            alloc,
            aspace,
            pids,
            tasks: Vec::new(),
            ready: VecDeque::new(),
            current: main_pid,
            idle: main_pid,
        };
        sched.tasks.push(main);
        sched.idle = sched.start("idle", 10, idle_entry, 0);
        sched
    }

    fn position(&self, pid: Pid) -> Option<usize> {
        self.tasks.iter().position(|t| t.pid == pid)
    }

    fn get_mut(&mut self, pid: Pid) -> Option<&mut Tcb> {
        self.tasks.iter_mut().find(|t| t.pid == pid)
    }

    /// Look a task up by pid (linear scan of the registry).
    #[must_use]
    pub fn find_by_pid(&self, pid: Pid) -> Option<&Tcb> {
        self.tasks.iter().find(|t| t.pid == pid)
    }

    /// The currently running task.
    #[must_use]
    pub fn current(&self) -> &Tcb {
        self.find_by_pid(self.current).expect("current task missing")
    }

    #[must_use]
    pub fn current_pid(&self) -> Pid {
        self.current
    }

    /// The idle task's pid.
    #[must_use]
    pub fn idle_pid(&self) -> Pid {
        self.idle
    }

    /// Whether `pid` is waiting in the ready queue.
    #[must_use]
    pub fn queued(&self, pid: Pid) -> bool {
        self.ready.contains(&pid)
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Create a kernel thread running `entry(arg)` and make it dispatchable.
    ///
    /// Allocates one kernel page as the thread's stack, fabricates the
    /// first-dispatch frame at its top (below the reserved interrupt-frame
    /// region) and appends the task to the registry and the ready queue.
    ///
    /// # Panics
    /// On kernel-page exhaustion — threads are created on boot paths where
    /// failing to allocate one page means the system cannot run at all.
    pub fn start(&mut self, name: &str, priority: u8, entry: EntryFn, arg: usize) -> Pid {
        let pid = self.pids.allocate();
        let stack = self
            .alloc
            .alloc_pages(self.aspace, Space::Kernel, 1)
            .expect("no kernel page for a task stack");

        let sp = stack + initial_frame_offset();
        let frame = SwitchFrame::initial(self.platform.trampoline(), entry, arg);
        // SAFETY: sp lies inside the page just allocated; the frame fits
        // below the page end by construction.
        unsafe { self.aspace.write(sp, frame) };

        let mut tcb = Tcb::new(pid, name, priority);
        tcb.kernel_sp = sp;
        tcb.stack_page = Some(stack);

        assert!(
            self.position(pid).is_none(),
            "task {pid} already registered"
        );
        assert!(!self.ready.contains(&pid), "task {pid} already queued");
        log::debug!("task {pid} '{name}' spawned, stack page {stack}");
        self.tasks.push(tcb);
        self.ready.push_back(pid);
        pid
    }

    /// Give `pid` its own address space, making it a process.
    ///
    /// `page_dir` is the kernel virtual address of its page-directory page;
    /// `user_space` tracks its user-region reservations. Both are torn down
    /// by [`exit`](Self::exit).
    ///
    /// # Panics
    /// If the task is unknown or already owns an address space.
    pub fn assign_address_space(
        &mut self,
        pid: Pid,
        page_dir: VirtualAddress,
        user_space: VirtualAddressSpace,
    ) {
        let task = self
            .get_mut(pid)
            .unwrap_or_else(|| panic!("assigning address space to unknown task {pid}"));
        assert!(
            task.page_dir.is_none(),
            "task {pid} already owns an address space"
        );
        task.page_dir = Some(page_dir);
        task.user_space = Some(user_space);
    }

    /// Allocate mapped user pages from the **current** task's own space.
    ///
    /// # Panics
    /// If the current task is a kernel thread (no user space).
    pub fn alloc_user_pages(&mut self, count: usize) -> Option<VirtualAddress> {
        let alloc = self.alloc;
        let aspace = self.aspace;
        let cur = self.current;
        let task = self.get_mut(cur).expect("current task missing");
        let user_space = task
            .user_space
            .as_mut()
            .expect("kernel thread has no user space");
        alloc.alloc_pages(aspace, Space::User(user_space), count)
    }

    /// Pick and dispatch the next ready task.
    ///
    /// Must be called with interrupts disabled — from the timer on quantum
    /// expiry, or from `yield`/`block`/`exit`. A still-running current task
    /// goes back to the queue tail with a fresh quantum; a blocked one is
    /// simply left off the queue. If nothing is ready, the idle task is
    /// unblocked first, so dispatch always succeeds.
    ///
    /// # Panics
    /// If interrupts are enabled on entry, or scheduler state is
    /// inconsistent (queued pid without a task, empty queue after idle).
    pub fn schedule(&mut self) {
        assert!(
            !self.platform.is_enabled(),
            "schedule() with interrupts enabled"
        );

        let prev = self.current;
        if let Some(task) = self.get_mut(prev) {
            if task.status == TaskStatus::Running {
                // Quantum expired: back of the line, budget refilled.
                task.ticks = task.priority;
                task.status = TaskStatus::Ready;
                assert!(!self.ready.contains(&prev), "running task {prev} was queued");
                self.ready.push_back(prev);
            }
            // Blocked tasks are not requeued; unblock() brings them back.
        }

        if self.ready.is_empty() {
            let idle = self.idle;
            self.unblock(idle);
        }

        let next = self
            .ready
            .pop_front()
            .expect("ready queue empty after idle unblock");
        let (resume, dir_va) = {
            let task = self.get_mut(next).expect("queued pid without a task");
            task.status = TaskStatus::Running;
            (task.kernel_sp, task.page_dir)
        };
        self.current = next;
        log::trace!("dispatching task {next}");

        // Activate the incoming space before touching its stack.
        let directory = dir_va.map(|va| {
            self.aspace
                .translate(va)
                .expect("process page directory is unmapped")
        });
        self.platform.activate_address_space(directory);

        let save_to = self
            .position(prev)
            .map(|i| &raw mut self.tasks[i].kernel_sp);
        // SAFETY: interrupts are disabled; resume points at a frame built by
        // start() or saved by an earlier switch.
        unsafe { self.platform.context_switch(save_to, resume) };
    }

    /// Voluntarily give up the CPU, keeping the remaining quantum.
    ///
    /// The caller resumes with the interrupt policy it had before yielding.
    pub fn yield_now(&mut self) {
        let _irq = IrqGuard::new(self.platform);
        let cur = self.current;
        assert!(!self.ready.contains(&cur), "yielding task {cur} already queued");
        self.ready.push_back(cur);
        self.get_mut(cur).expect("current task missing").status = TaskStatus::Ready;
        self.schedule();
    }

    /// Block the current task as `status` and switch away.
    ///
    /// The task is *not* requeued; it stays off the ready queue until
    /// [`unblock`](Self::unblock). Blocking is indefinite — there are no
    /// timeouts. Resumes with the prior interrupt policy once unblocked and
    /// eventually dispatched again.
    ///
    /// # Panics
    /// If `status` is not one of the blocked states.
    pub fn block(&mut self, status: TaskStatus) {
        assert!(status.is_blocked(), "block() with non-blocked status {status:?}");
        let _irq = IrqGuard::new(self.platform);
        let cur = self.current;
        self.get_mut(cur).expect("current task missing").status = status;
        self.schedule();
    }

    /// Make a blocked task dispatchable again, at the **head** of the queue
    /// so it runs promptly.
    ///
    /// # Panics
    /// If the task is unknown, not in a blocked state, or already queued.
    pub fn unblock(&mut self, pid: Pid) {
        let _irq = IrqGuard::new(self.platform);
        {
            let task = self
                .get_mut(pid)
                .unwrap_or_else(|| panic!("unblocking unknown task {pid}"));
            assert!(
                task.status.is_blocked(),
                "unblocking task {pid} that is not blocked"
            );
            task.status = TaskStatus::Ready;
        }
        assert!(!self.ready.contains(&pid), "unblocked task {pid} already queued");
        self.ready.push_front(pid);
    }

    /// Reap a task: tear down its resources and erase it from the system.
    ///
    /// Frees the page-directory page if the task owned one (its user-space
    /// bookkeeping dies with the TCB), removes it from queue and registry,
    /// frees its stack page — unless it is the adopted bootstrap task, whose
    /// stack was never heap-allocated — and releases its pid.
    ///
    /// With `reschedule`, dispatches the next task and never returns; used
    /// when a task exits itself. Interrupts are left disabled either way.
    ///
    /// # Panics
    /// If the task is unknown, or `schedule()` ever returns here.
    pub fn exit(&mut self, pid: Pid, reschedule: bool) {
        // Deliberately never restored: dispatch re-enables interrupts
        // through the incoming task's saved context.
        let _ = self.platform.disable();

        let idx = self
            .position(pid)
            .unwrap_or_else(|| panic!("exiting unknown task {pid}"));
        self.tasks[idx].status = TaskStatus::Died;

        // May or may not be queued, depending on who is exiting whom.
        self.ready.retain(|p| *p != pid);

        let task = self.tasks.remove(idx);
        if let Some(dir) = task.page_dir {
            self.alloc.free_pages(self.aspace, Space::Kernel, dir, 1);
        }
        if let Some(stack) = task.stack_page {
            self.alloc.free_pages(self.aspace, Space::Kernel, stack, 1);
        }
        self.pids.release(task.pid);
        log::debug!("task {pid} reaped");

        if reschedule {
            self.schedule();
            unreachable!("schedule() returned into exit()");
        }
    }

    /// Account one timer tick against the running task.
    ///
    /// Called from the timer interrupt with interrupts disabled; switches
    /// tasks when the quantum is spent.
    pub fn tick(&mut self) {
        assert!(
            !self.platform.is_enabled(),
            "tick() outside the timer interrupt window"
        );
        let cur = self.current;
        let expired = {
            let task = self.get_mut(cur).expect("current task missing");
            assert!(task.guard_intact(), "TCB canary of task {cur} destroyed");
            task.elapsed_ticks += 1;
            if task.ticks == 0 {
                true
            } else {
                task.ticks -= 1;
                false
            }
        };
        if expired {
            self.schedule();
        }
    }

    /// A listing of every registered task, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TaskInfo> {
        self.tasks
            .iter()
            .map(|t| TaskInfo {
                pid: t.pid,
                parent: t.parent,
                status: t.status,
                elapsed_ticks: t.elapsed_ticks,
                name: t.name.clone(),
            })
            .collect()
    }
}
