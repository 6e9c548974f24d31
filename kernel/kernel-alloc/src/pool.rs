//! Physical page-frame pools.
//!
//! Physical memory above the boot image is split once, at initialization,
//! into a kernel pool and a user pool. Each pool is one bitmap: bit `i` set
//! means frame `base + i * PAGE_SIZE` is allocated to some mapping.

use crate::Bitmap;
use kernel_info::memory::{BOOT_PAGE_TABLE_PAGES, LOW_MEMORY_BYTES};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_sync::SpinMutex;
use kernel_vmem::FrameAlloc;

/// One physical-memory arena: a bitmap over page frames from a fixed base.
pub struct PhysicalPool {
    name: &'static str,
    bitmap: Bitmap,
    base: PhysicalAddress,
    frames: usize,
    free: usize,
}

impl PhysicalPool {
    /// A pool of `frames` frames starting at `base`.
    ///
    /// `frames` must be a multiple of 8 — pool sizing deliberately drops
    /// remainder pages so the bitmap can never describe memory that does not
    /// exist (see [`MemoryPools::from_total_memory`]).
    #[must_use]
    pub fn new(name: &'static str, base: PhysicalAddress, frames: usize) -> Self {
        assert!(base.is_page_aligned(), "pool base must be page-aligned");
        assert!(frames % 8 == 0, "pool size must fill whole bitmap bytes");
        Self {
            name,
            bitmap: Bitmap::new(frames / 8),
            base,
            frames,
            free: frames,
        }
    }

    /// Allocate one frame. `None` when the pool is exhausted — callers treat
    /// this as a recoverable failure, not a crash.
    pub fn allocate(&mut self) -> Option<PhysicalAddress> {
        let bit = self.bitmap.scan(1)?;
        self.bitmap.set(bit, true);
        self.free -= 1;
        Some(self.base + (bit as u32) * PAGE_SIZE)
    }

    /// Return a frame to the pool.
    ///
    /// # Panics
    /// If `addr` is outside the pool, unaligned, or not currently allocated.
    /// A stray free means allocator state is already inconsistent.
    pub fn free(&mut self, addr: PhysicalAddress) {
        assert!(
            self.contains(addr),
            "freeing {addr} outside the {} pool",
            self.name
        );
        assert!(addr.is_page_aligned(), "freeing unaligned address {addr}");
        let bit = ((addr.as_u32() - self.base.as_u32()) / PAGE_SIZE) as usize;
        assert!(
            self.bitmap.test(bit),
            "double free of frame {addr} in the {} pool",
            self.name
        );
        self.bitmap.set(bit, false);
        self.free += 1;
    }

    /// Whether `addr` falls inside this pool's physical range.
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        let start = u64::from(self.base.as_u32());
        let end = start + self.frames as u64 * u64::from(PAGE_SIZE);
        (u64::from(addr.as_u32())) >= start && u64::from(addr.as_u32()) < end
    }

    /// Frames currently unallocated.
    #[must_use]
    pub fn free_frames(&self) -> usize {
        self.free
    }

    /// Total frames managed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.frames
    }
}

impl FrameAlloc for PhysicalPool {
    fn alloc_frame(&mut self) -> Option<PhysicalPage> {
        self.allocate().map(PhysicalPage::containing)
    }
}

/// The two process-wide pools, each behind its blocking lock.
pub struct MemoryPools {
    pub kernel: SpinMutex<PhysicalPool>,
    pub user: SpinMutex<PhysicalPool>,
}

impl MemoryPools {
    /// Partition physical memory from the boot-probed total.
    ///
    /// The low 1 MiB plus the boot page-table frames are already spoken for;
    /// the remainder is split half and half between the kernel and user
    /// pools. Bitmap lengths round down to whole bytes, losing at most seven
    /// pages per pool in exchange for never needing bounds checks against
    /// phantom memory.
    #[must_use]
    pub fn from_total_memory(total_bytes: u32) -> Self {
        let used = LOW_MEMORY_BYTES + BOOT_PAGE_TABLE_PAGES * PAGE_SIZE;
        assert!(total_bytes > used, "less physical memory than the boot image uses");

        let all_free_pages = (total_bytes - used) / PAGE_SIZE;
        let kernel_free_pages = all_free_pages / 2;
        let user_free_pages = all_free_pages - kernel_free_pages;

        let kernel_frames = (kernel_free_pages / 8 * 8) as usize;
        let user_frames = (user_free_pages / 8 * 8) as usize;

        let kernel_base = PhysicalAddress::new(used);
        let user_base = kernel_base + kernel_free_pages * PAGE_SIZE;

        log::debug!(
            "physical pools: kernel {kernel_frames} frames at {kernel_base}, \
             user {user_frames} frames at {user_base}"
        );

        Self {
            kernel: SpinMutex::new(PhysicalPool::new("kernel", kernel_base, kernel_frames)),
            user: SpinMutex::new(PhysicalPool::new("user", user_base, user_frames)),
        }
    }
}
