//! End-to-end allocator behavior against simulated physical memory.

use kernel_alloc::{PageAllocator, Space, VirtualAddressSpace};
use kernel_info::memory::{KERNEL_HEAP_BASE, USER_IMAGE_BASE};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_vmem::sim::SimPhys;
use kernel_vmem::AddressSpace;

/// An 8 MiB machine: 2 MiB boot image + page tables, 768 frames per pool.
const TOTAL_MEMORY: u32 = 8 * 1024 * 1024;

fn setup(phys: &SimPhys) -> (PageAllocator, AddressSpace<'_, SimPhys>) {
    let alloc = PageAllocator::new(TOTAL_MEMORY);
    let aspace = alloc
        .with_kernel_pool(|pool| AddressSpace::create(phys, pool))
        .expect("kernel page directory");
    (alloc, aspace)
}

#[test]
fn kernel_pages_are_mapped_zeroed_and_reusable() {
    let phys = SimPhys::new((TOTAL_MEMORY / PAGE_SIZE) as usize);
    let (alloc, aspace) = setup(&phys);
    let frames_before = alloc.free_kernel_frames();

    let va = alloc
        .alloc_pages(&aspace, Space::Kernel, 3)
        .expect("3 kernel pages");
    assert_eq!(va, KERNEL_HEAP_BASE);

    // Three distinct frames, all mapped, all zeroed.
    let mut frames = Vec::new();
    for i in 0..3 {
        let page = va + i * PAGE_SIZE;
        let pa = aspace.translate(page).expect("mapped");
        assert!(!frames.contains(&pa));
        frames.push(pa);
        assert_eq!(unsafe { aspace.read::<u64>(page) }, 0);
    }
    // 3 data frames + 1 table frame for the heap region.
    assert_eq!(alloc.free_kernel_frames(), frames_before - 4);

    // Write a marker into each page, then free all three.
    for i in 0..3 {
        unsafe { aspace.write::<u32>(va + i * PAGE_SIZE, 0x5a5a_0000 | i) };
    }
    alloc.free_pages(&aspace, Space::Kernel, va, 3);

    // The data frames are allocatable again (the table frame stays).
    assert_eq!(alloc.free_kernel_frames(), frames_before - 1);
    let again = alloc
        .alloc_pages(&aspace, Space::Kernel, 3)
        .expect("reallocated");
    assert_eq!(again, va);
    // Recycled pages come back zeroed, markers gone.
    assert_eq!(unsafe { aspace.read::<u32>(again) }, 0);
}

#[test]
fn exhaustion_mid_request_rolls_everything_back() {
    let phys = SimPhys::new((TOTAL_MEMORY / PAGE_SIZE) as usize);
    let (alloc, aspace) = setup(&phys);

    // One warm-up page so the heap region's page table already exists.
    let first = alloc
        .alloc_pages(&aspace, Space::Kernel, 1)
        .expect("warm-up page");

    // Drain the kernel pool down to two frames.
    alloc.with_kernel_pool(|pool| {
        while pool.free_frames() > 2 {
            pool.allocate().expect("draining");
        }
    });

    // Four pages cannot be served from two frames.
    assert!(alloc.alloc_pages(&aspace, Space::Kernel, 4).is_none());

    // Nothing leaked: both frames still free, nothing extra mapped.
    assert_eq!(alloc.free_kernel_frames(), 2);
    assert!(aspace.translate(first + PAGE_SIZE).is_none());

    // The virtual reservation was released too: the next single-page
    // allocation lands directly after the warm-up page.
    let next = alloc
        .alloc_pages(&aspace, Space::Kernel, 1)
        .expect("one frame left");
    assert_eq!(next, first + PAGE_SIZE);
}

#[test]
fn user_pages_draw_from_the_user_pool() {
    let phys = SimPhys::new((TOTAL_MEMORY / PAGE_SIZE) as usize);
    let (alloc, aspace) = setup(&phys);
    let mut user_space = VirtualAddressSpace::user_default();

    let kernel_before = alloc.free_kernel_frames();
    let user_before = alloc.free_user_frames();

    let va = alloc
        .alloc_pages(&aspace, Space::User(&mut user_space), 2)
        .expect("2 user pages");
    assert_eq!(va, USER_IMAGE_BASE);
    assert!(aspace.translate(va).is_some());

    // Data frames from the user pool; the page table from the kernel pool.
    assert_eq!(alloc.free_user_frames(), user_before - 2);
    assert_eq!(alloc.free_kernel_frames(), kernel_before - 1);

    alloc.free_pages(&aspace, Space::User(&mut user_space), va, 2);
    assert_eq!(alloc.free_user_frames(), user_before);
    assert!(aspace.translate(va).is_none());
}

#[test]
fn map_at_faults_in_an_owned_address() {
    let phys = SimPhys::new((TOTAL_MEMORY / PAGE_SIZE) as usize);
    let (alloc, aspace) = setup(&phys);

    let va = VirtualAddress::new(KERNEL_HEAP_BASE + 16 * PAGE_SIZE);
    assert!(aspace.translate(va).is_none());
    assert_eq!(alloc.map_at(&aspace, Space::Kernel, va), Some(va));
    assert!(aspace.translate(va).is_some());

    // The surrounding heap is untouched; a fresh run starts at the base.
    let fresh = alloc
        .alloc_pages(&aspace, Space::Kernel, 2)
        .expect("2 pages");
    assert_eq!(fresh, KERNEL_HEAP_BASE);
}
