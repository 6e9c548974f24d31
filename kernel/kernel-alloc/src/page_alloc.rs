//! Page-allocation orchestration.
//!
//! One call here is three coordinated steps: reserve virtual pages, allocate
//! physical frames, install the mappings. The virtual range is contiguous
//! but the frames backing it need not be, so mapping happens page by page.
//!
//! Multi-page requests are **all-or-nothing**: if frame allocation fails
//! partway, the pages already installed are unmapped, their frames returned,
//! and the virtual reservation released. A half-completed allocation would
//! leak frames that nothing can ever find again.

use crate::pool::MemoryPools;
use crate::vaddr::VirtualAddressSpace;
use kernel_info::memory::{KERNEL_HEAP_BASE, KERNEL_SPLIT};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_sync::SpinMutex;
use kernel_vmem::{AddressSpace, PageEntryBits, PhysMapper};

/// Which space a request draws from.
///
/// Kernel requests use the process-wide kernel heap; user requests carry a
/// borrow of the calling task's own embedded space.
pub enum Space<'s> {
    Kernel,
    User(&'s mut VirtualAddressSpace),
}

/// The page-granular allocator: pools + kernel heap space, glued to the
/// paging layer.
pub struct PageAllocator {
    pools: MemoryPools,
    kernel_vaddr: SpinMutex<VirtualAddressSpace>,
}

impl PageAllocator {
    /// Build pools and the kernel heap space from the boot-probed total
    /// physical memory size.
    #[must_use]
    pub fn new(total_memory_bytes: u32) -> Self {
        let pools = MemoryPools::from_total_memory(total_memory_bytes);
        // The heap space mirrors the kernel pool's capacity: there is no
        // point tracking more virtual pages than frames that could back them.
        let heap_pages = pools.kernel.lock().capacity();
        Self {
            pools,
            kernel_vaddr: SpinMutex::new(VirtualAddressSpace::new(
                VirtualAddress::new(KERNEL_HEAP_BASE),
                heap_pages,
            )),
        }
    }

    /// Allocate `count` mapped, zero-filled pages from the chosen space.
    ///
    /// Returns the first virtual address, or `None` on exhaustion of either
    /// the virtual range or the physical pool (with everything rolled back).
    ///
    /// # Panics
    /// If `count` is zero, or if a user reservation would cross the kernel
    /// split — the latter means a corrupted user space bitmap, not bad input.
    pub fn alloc_pages<M: PhysMapper>(
        &self,
        aspace: &AddressSpace<'_, M>,
        space: Space<'_>,
        count: usize,
    ) -> Option<VirtualAddress> {
        assert!(count > 0, "allocating zero pages");

        let mut space = space;
        let user = matches!(space, Space::User(_));
        let vaddr = match &mut space {
            Space::Kernel => self.kernel_vaddr.lock().reserve(count)?,
            Space::User(us) => {
                let va = us.reserve(count)?;
                assert!(
                    va.as_u32() as u64 + count as u64 * u64::from(PAGE_SIZE)
                        <= u64::from(KERNEL_SPLIT),
                    "user reservation at {va} crosses the kernel split"
                );
                va
            }
        };

        let leaf_flags = if user {
            PageEntryBits::user_rw()
        } else {
            PageEntryBits::kernel_rw()
        };

        // Table frames always come from the kernel pool, so its lock is held
        // across the whole installation. Lock order is kernel before user.
        let mut kernel = self.pools.kernel.lock();
        let mut installed = 0;
        let mut failed = false;

        for i in 0..count {
            let va = vaddr + (i as u32) * PAGE_SIZE;
            let pa = if user {
                self.pools.user.lock().allocate()
            } else {
                kernel.allocate()
            };
            let Some(pa) = pa else {
                failed = true;
                break;
            };
            let frame = PhysicalPage::containing(pa);
            if let Err(e) = aspace.map_one(&mut *kernel, va, frame, leaf_flags) {
                log::warn!("mapping {va} failed: {e}");
                if user {
                    self.pools.user.lock().free(pa);
                } else {
                    kernel.free(pa);
                }
                failed = true;
                break;
            }
            aspace.zero_page(va);
            installed += 1;
        }

        if failed {
            log::warn!(
                "out of frames after {installed} of {count} pages at {vaddr}; rolling back"
            );
            for i in 0..installed {
                let va = vaddr + (i as u32) * PAGE_SIZE;
                let frame = aspace.unmap_one(va);
                if user {
                    self.pools.user.lock().free(frame.base());
                } else {
                    kernel.free(frame.base());
                }
            }
            drop(kernel);
            match space {
                Space::Kernel => self.kernel_vaddr.lock().release(vaddr, count),
                Space::User(us) => us.release(vaddr, count),
            }
            return None;
        }

        Some(vaddr)
    }

    /// Fault in one frame behind a virtual address the caller already owns.
    ///
    /// Marks the page in the chosen space, allocates a frame from the
    /// matching pool and installs the mapping. The page is **not** zeroed;
    /// callers of this path overwrite it wholesale.
    pub fn map_at<M: PhysMapper>(
        &self,
        aspace: &AddressSpace<'_, M>,
        space: Space<'_>,
        va: VirtualAddress,
    ) -> Option<VirtualAddress> {
        let mut space = space;
        let user = matches!(space, Space::User(_));
        match &mut space {
            Space::Kernel => self.kernel_vaddr.lock().mark(va),
            Space::User(us) => {
                assert!(
                    va.as_u32() < KERNEL_SPLIT,
                    "user mapping at {va} inside kernel space"
                );
                us.mark(va);
            }
        }

        let mut kernel = self.pools.kernel.lock();
        let pa = if user {
            self.pools.user.lock().allocate()
        } else {
            kernel.allocate()
        };
        let Some(pa) = pa else {
            drop(kernel);
            match space {
                Space::Kernel => self.kernel_vaddr.lock().release(va, 1),
                Space::User(us) => us.release(va, 1),
            }
            return None;
        };

        let leaf_flags = if user {
            PageEntryBits::user_rw()
        } else {
            PageEntryBits::kernel_rw()
        };
        if let Err(e) = aspace.map_one(&mut *kernel, va, PhysicalPage::containing(pa), leaf_flags)
        {
            log::warn!("mapping {va} failed: {e}");
            if user {
                self.pools.user.lock().free(pa);
            } else {
                kernel.free(pa);
            }
            drop(kernel);
            match space {
                Space::Kernel => self.kernel_vaddr.lock().release(va, 1),
                Space::User(us) => us.release(va, 1),
            }
            return None;
        }
        Some(va)
    }

    /// Unmap and free `count` pages starting at `vaddr`, returning each frame
    /// to the pool its address belongs to, then release the virtual range.
    ///
    /// # Panics
    /// If any page in the range is not mapped, or a frame belongs to neither
    /// pool.
    pub fn free_pages<M: PhysMapper>(
        &self,
        aspace: &AddressSpace<'_, M>,
        space: Space<'_>,
        vaddr: VirtualAddress,
        count: usize,
    ) {
        assert!(count > 0, "freeing zero pages");

        {
            let mut kernel = self.pools.kernel.lock();
            for i in 0..count {
                let va = vaddr + (i as u32) * PAGE_SIZE;
                let frame = aspace.unmap_one(va);
                let pa = frame.base();
                // The frame's address, not the caller, decides its pool.
                if kernel.contains(pa) {
                    kernel.free(pa);
                } else {
                    self.pools.user.lock().free(pa);
                }
            }
        }

        match space {
            Space::Kernel => self.kernel_vaddr.lock().release(vaddr, count),
            Space::User(us) => us.release(vaddr, count),
        }
    }

    /// Run `f` with the kernel pool locked, e.g. to feed table frames into
    /// address-space construction.
    pub fn with_kernel_pool<R>(&self, f: impl FnOnce(&mut crate::PhysicalPool) -> R) -> R {
        f(&mut self.pools.kernel.lock())
    }

    /// Unallocated frames in the kernel pool.
    #[must_use]
    pub fn free_kernel_frames(&self) -> usize {
        self.pools.kernel.lock().free_frames()
    }

    /// Unallocated frames in the user pool.
    #[must_use]
    pub fn free_user_frames(&self) -> usize {
        self.pools.user.lock().free_frames()
    }
}
