//! Scheduler behavior against the software platform and simulated memory.

use kernel_alloc::{PageAllocator, Space, VirtualAddressSpace};
use kernel_memory_addresses::PAGE_SIZE;
use kernel_sched::{Platform, Scheduler, SoftPlatform, SwitchFrame, TaskStatus, initial_frame_offset};
use kernel_sync::InterruptControl;
use kernel_vmem::AddressSpace;
use kernel_vmem::sim::SimPhys;

const TOTAL_MEMORY: u32 = 8 * 1024 * 1024;

extern "C" fn nop_task(_arg: usize) {}

macro_rules! fixture {
    ($phys:ident, $platform:ident, $alloc:ident, $aspace:ident, $sched:ident) => {
        let $phys = SimPhys::new((TOTAL_MEMORY / PAGE_SIZE) as usize);
        let $platform = SoftPlatform::new();
        let $alloc = PageAllocator::new(TOTAL_MEMORY);
        let $aspace = $alloc
            .with_kernel_pool(|pool| AddressSpace::create(&$phys, pool))
            .expect("kernel page directory");
        #[allow(unused_mut)]
        let mut $sched = Scheduler::new(&$platform, &$alloc, &$aspace, "main", 31, nop_task);
    };
}

#[test]
fn bootstrap_adopts_main_and_spawns_idle() {
    fixture!(phys, platform, alloc, aspace, sched);

    let main = sched.current_pid();
    assert_eq!(main.as_u32(), 1);
    assert_eq!(sched.current().status, TaskStatus::Running);
    // Main adopted the boot stack; it owns no heap page.
    assert!(sched.current().stack_page.is_none());

    let idle = sched.idle_pid();
    assert_eq!(idle.as_u32(), 2);
    assert!(sched.queued(idle));
    assert_eq!(sched.task_count(), 2);
}

#[test]
fn start_builds_the_first_dispatch_frame() {
    fixture!(phys, platform, alloc, aspace, sched);

    let pid = sched.start("worker", 5, nop_task, 7);
    let task = sched.find_by_pid(pid).expect("registered");
    let stack = task.stack_page.expect("stack page");
    assert_eq!(task.kernel_sp, stack + initial_frame_offset());

    let frame = unsafe { aspace.read::<SwitchFrame>(task.kernel_sp) };
    assert_eq!(frame.eip, platform.trampoline().as_u32());
    assert_eq!(frame.function, nop_task as usize as u32);
    assert_eq!(frame.arg, 7);
    assert_eq!((frame.ebp, frame.ebx, frame.edi, frame.esi), (0, 0, 0, 0));
}

#[test]
fn start_then_exit_round_trips_registry_queue_and_pid() {
    fixture!(phys, platform, alloc, aspace, sched);
    let frames_before = alloc.free_kernel_frames();

    let pid = sched.start("worker", 5, nop_task, 0);
    assert_eq!(sched.task_count(), 3);
    assert!(sched.queued(pid));
    assert!(sched.find_by_pid(pid).is_some());

    sched.exit(pid, false);
    assert_eq!(sched.task_count(), 2);
    assert!(!sched.queued(pid));
    assert!(sched.find_by_pid(pid).is_none());
    // Stack page returned to the kernel pool.
    assert_eq!(alloc.free_kernel_frames(), frames_before);

    // The pid is immediately reusable.
    let again = sched.start("worker2", 5, nop_task, 0);
    assert_eq!(again, pid);
}

#[test]
fn round_robin_dispatches_everyone_before_anyone_twice() {
    fixture!(phys, platform, alloc, aspace, sched);
    let main = sched.current_pid();

    let a = sched.start("a", 2, nop_task, 0);
    let b = sched.start("b", 2, nop_task, 0);
    let c = sched.start("c", 2, nop_task, 0);

    platform.disable();
    let mut order = Vec::new();
    for _ in 0..5 {
        sched.schedule();
        order.push(sched.current_pid());
    }

    // Five dispatches, five distinct tasks: idle, a, b, c, then main again.
    let mut unique: Vec<u32> = order.iter().map(|p| p.as_u32()).collect();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), 5);
    assert_eq!(order[1..4], [a, b, c]);
    assert_eq!(order[4], main);

    // The rotation repeats in the same order.
    for expected in [sched.idle_pid(), a, b, c, main] {
        sched.schedule();
        assert_eq!(sched.current_pid(), expected);
    }
}

#[test]
fn blocked_task_skips_the_queue_until_unblocked_to_front() {
    fixture!(phys, platform, alloc, aspace, sched);
    let main = sched.current_pid();
    let _a = sched.start("a", 2, nop_task, 0);

    platform.disable();
    sched.block(TaskStatus::Blocked);
    // Main was never requeued; the idle task (queue head) took over.
    assert_eq!(sched.current_pid(), sched.idle_pid());
    assert!(!sched.queued(main));
    assert_eq!(sched.find_by_pid(main).unwrap().status, TaskStatus::Blocked);

    sched.unblock(main);
    assert!(sched.queued(main));
    assert_eq!(sched.find_by_pid(main).unwrap().status, TaskStatus::Ready);

    // Head placement: main dispatches before "a", which was queued earlier.
    sched.schedule();
    assert_eq!(sched.current_pid(), main);
}

#[test]
#[should_panic(expected = "not blocked")]
fn unblocking_a_ready_task_panics() {
    fixture!(phys, platform, alloc, aspace, sched);
    let a = sched.start("a", 2, nop_task, 0);
    sched.unblock(a);
}

#[test]
#[should_panic(expected = "non-blocked status")]
fn blocking_with_a_runnable_status_panics() {
    fixture!(phys, platform, alloc, aspace, sched);
    sched.block(TaskStatus::Ready);
}

#[test]
fn yield_requeues_behind_existing_waiters() {
    fixture!(phys, platform, alloc, aspace, sched);
    let main = sched.current_pid();

    assert!(platform.is_enabled());
    sched.yield_now();
    // Ready queue was [idle]; main went behind it.
    assert_eq!(sched.current_pid(), sched.idle_pid());
    assert!(sched.queued(main));
    // The caller's interrupt policy is restored.
    assert!(platform.is_enabled());

    sched.yield_now();
    assert_eq!(sched.current_pid(), main);
}

#[test]
fn empty_ready_queue_wakes_the_idle_task() {
    fixture!(phys, platform, alloc, aspace, sched);
    let main = sched.current_pid();
    let idle = sched.idle_pid();

    platform.disable();
    sched.schedule();
    assert_eq!(sched.current_pid(), idle);

    // The idle body parks itself; main is the only runnable task left.
    sched.block(TaskStatus::Blocked);
    assert_eq!(sched.current_pid(), main);

    // Main blocks too. Nothing is ready, so schedule() must wake idle
    // rather than dead-end on an empty queue.
    sched.block(TaskStatus::Waiting);
    assert_eq!(sched.current_pid(), idle);
    assert_eq!(sched.current().status, TaskStatus::Running);
    assert_eq!(sched.find_by_pid(main).unwrap().status, TaskStatus::Waiting);
}

#[test]
fn quantum_length_equals_priority() {
    fixture!(phys, platform, alloc, aspace, sched);

    let w = sched.start("worker", 3, nop_task, 0);
    platform.disable();
    while sched.current_pid() != w {
        sched.schedule();
    }

    // Budget of 3: three ticks spend it, the fourth forces the switch.
    for _ in 0..3 {
        sched.tick();
        assert_eq!(sched.current_pid(), w);
    }
    sched.tick();
    assert_ne!(sched.current_pid(), w);

    let task = sched.find_by_pid(w).unwrap();
    assert_eq!(task.elapsed_ticks, 4);
    // Requeued with a refilled budget.
    assert_eq!(task.ticks, 3);
    assert!(sched.queued(w));
}

#[test]
fn exit_tears_down_a_process_address_space() {
    fixture!(phys, platform, alloc, aspace, sched);
    let frames_before = alloc.free_kernel_frames();

    let w = sched.start("proc", 8, nop_task, 0);
    let dir = alloc
        .alloc_pages(&aspace, Space::Kernel, 1)
        .expect("directory page");
    sched.assign_address_space(w, dir, VirtualAddressSpace::user_default());
    assert!(sched.find_by_pid(w).unwrap().is_process());

    // Dispatching the process activates its directory; dispatching a kernel
    // thread falls back to the kernel directory.
    platform.disable();
    while sched.current_pid() != w {
        sched.schedule();
    }
    assert_eq!(platform.last_activated(), aspace.translate(dir));
    sched.schedule();
    assert_eq!(platform.last_activated(), None);

    sched.exit(w, false);
    // Directory page and stack page both returned.
    assert_eq!(alloc.free_kernel_frames(), frames_before);
}

#[test]
fn snapshot_lists_tasks_in_registration_order() {
    fixture!(phys, platform, alloc, aspace, sched);
    sched.start("a", 2, nop_task, 0);
    sched.start("b", 2, nop_task, 0);

    let rows = sched.snapshot();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["main", "idle", "a", "b"]);
    assert_eq!(rows[0].status, TaskStatus::Running);
}

#[test]
fn user_allocation_draws_from_the_current_tasks_space() {
    fixture!(phys, platform, alloc, aspace, sched);
    let main = sched.current_pid();

    let dir = alloc
        .alloc_pages(&aspace, Space::Kernel, 1)
        .expect("directory page");
    sched.assign_address_space(main, dir, VirtualAddressSpace::user_default());

    let user_before = alloc.free_user_frames();
    let va = sched.alloc_user_pages(2).expect("2 user pages");
    assert!(va.as_u32() < kernel_info::memory::KERNEL_SPLIT);
    assert_eq!(alloc.free_user_frames(), user_before - 2);
    assert!(aspace.translate(va).is_some());
}
