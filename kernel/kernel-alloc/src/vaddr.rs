//! Virtual-page reservation bitmaps.
//!
//! One instance tracks the process-wide kernel heap range; each process
//! carries its own instance for the user range inside its control block.
//! A set bit means the virtual page is reserved. Page-table installation is
//! synchronous with reservation, so reserved pages are mapped pages.

use crate::Bitmap;
use kernel_info::memory::{KERNEL_SPLIT, USER_IMAGE_BASE};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// A bitmap allocator over a contiguous virtual-page range.
pub struct VirtualAddressSpace {
    bitmap: Bitmap,
    base: VirtualAddress,
}

impl VirtualAddressSpace {
    /// A space of `pages` virtual pages starting at `base`.
    #[must_use]
    pub fn new(base: VirtualAddress, pages: usize) -> Self {
        assert!(base.is_page_aligned(), "space base must be page-aligned");
        assert!(pages % 8 == 0, "space size must fill whole bitmap bytes");
        Self {
            bitmap: Bitmap::new(pages / 8),
            base,
        }
    }

    /// The standard user-region space for one process: image base up to the
    /// kernel split.
    #[must_use]
    pub fn user_default() -> Self {
        let pages = (KERNEL_SPLIT - USER_IMAGE_BASE) / PAGE_SIZE;
        Self::new(VirtualAddress::new(USER_IMAGE_BASE), (pages / 8 * 8) as usize)
    }

    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// Virtual pages tracked.
    #[must_use]
    pub fn page_capacity(&self) -> usize {
        self.bitmap.len_bits()
    }

    /// Reserve `count` contiguous virtual pages; `None` if no run is free.
    pub fn reserve(&mut self, count: usize) -> Option<VirtualAddress> {
        let start = self.bitmap.scan(count)?;
        self.bitmap.set_range(start, count, true);
        Some(self.base + (start as u32) * PAGE_SIZE)
    }

    /// Reserve the specific page containing `va`.
    ///
    /// Used when the caller already owns the address (extending an existing
    /// region) and only needs the bookkeeping bit.
    ///
    /// # Panics
    /// If `va` is outside this space or its page is already reserved.
    pub fn mark(&mut self, va: VirtualAddress) {
        let bit = self.bit_of(va);
        assert!(
            !self.bitmap.test(bit),
            "virtual page {va} is already reserved"
        );
        self.bitmap.set(bit, true);
    }

    /// Release `count` pages starting at `start`.
    ///
    /// # Panics
    /// If any page in the range was not reserved.
    pub fn release(&mut self, start: VirtualAddress, count: usize) {
        let first = self.bit_of(start);
        for bit in first..first + count {
            assert!(
                self.bitmap.test(bit),
                "releasing an unreserved virtual page in {start}+{count}"
            );
            self.bitmap.set(bit, false);
        }
    }

    fn bit_of(&self, va: VirtualAddress) -> usize {
        assert!(va.is_page_aligned(), "unaligned virtual address {va}");
        assert!(
            va >= self.base,
            "virtual address {va} below space base {}",
            self.base
        );
        let bit = ((va.as_u32() - self.base.as_u32()) / PAGE_SIZE) as usize;
        assert!(
            bit < self.bitmap.len_bits(),
            "virtual address {va} beyond space end"
        );
        bit
    }
}
