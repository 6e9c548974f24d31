//! # Address Space (32-bit, page-directory-rooted)
//!
//! Strongly-typed helpers to build and query a **single** virtual address
//! space: a page directory plus the page tables hanging off it.
//!
//! ## Highlights
//!
//! - [`AddressSpace::map_one`] installs one 4 KiB mapping, allocating and
//!   zeroing the intermediate page table on first use of its 4 MiB range.
//! - [`AddressSpace::translate`] resolves a VA to a PA, preserving the
//!   page-offset bits.
//! - [`AddressSpace::unmap_one`] clears a present PTE and hands the frame
//!   back to the caller.
//! - [`AddressSpace::activate`] loads CR3 with this space's directory.
//!
//! ## Design
//!
//! - Every table access goes through the [`PhysMapper`] seam; the code never
//!   fabricates pointers from physical addresses on its own.
//! - Table frames come from the caller-provided [`FrameAlloc`]; the kernel
//!   pool is used for these even when the leaf frame is a user frame.
//! - Overwriting a present PTE is a kernel bug and panics; running with a
//!   silently clobbered mapping would corrupt memory much later.
//!
//! ## Safety
//!
//! - Mutating an **active** space requires TLB maintenance (`invlpg` or a
//!   CR3 reload); that is the dispatcher's business, not this module's.

use crate::page_table::{PageDirectory, PageEntryBits, PageTable, PdEntry, PtEntry};
use crate::{FrameAlloc, PhysMapper};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress};

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalPage, // page-directory frame
    mapper: &'m M,
}

/// Recoverable mapping failures.
///
/// Everything else that can go wrong in here is a contract violation and
/// panics instead.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("out of physical frames for a page table")]
    OutOfTableFrames,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Allocate and zero a fresh page directory, returning the space rooted
    /// at it. `None` when the allocator is exhausted.
    pub fn create<A: FrameAlloc>(mapper: &'m M, alloc: &mut A) -> Option<Self> {
        let root = alloc.alloc_frame()?;
        let space = Self { root, mapper };
        space.zero_frame(root);
        Some(space)
    }

    /// Wrap an existing directory frame (e.g. the boot-built kernel
    /// directory) without touching it.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalPage) -> Self {
        Self { root, mapper }
    }

    /// The page-directory frame (what CR3 would hold).
    #[inline]
    #[must_use]
    pub const fn root_page(&self) -> PhysicalPage {
        self.root
    }

    fn directory_mut(&self) -> &'m mut PageDirectory {
        // SAFETY: the root frame holds a directory for the space's lifetime.
        unsafe { self.mapper.phys_to_mut(self.root.base()) }
    }

    fn table_mut(&self, page: PhysicalPage) -> &'m mut PageTable {
        // SAFETY: only frames installed via make_table are passed here.
        unsafe { self.mapper.phys_to_mut(page.base()) }
    }

    fn zero_frame(&self, page: PhysicalPage) {
        // SAFETY: the frame was just allocated and is exclusively ours.
        let bytes: &mut [u8; PAGE_SIZE as usize] = unsafe { self.mapper.phys_to_mut(page.base()) };
        bytes.fill(0);
    }

    /// Install the mapping `va → frame` with `leaf_flags`.
    ///
    /// The page table covering `va` is allocated from `alloc` and zeroed on
    /// first use — stale bits in a recycled frame would otherwise be read
    /// back as valid mappings. The directory entry is created writable and
    /// user-visible; per-page protection lives in the leaf.
    ///
    /// # Panics
    /// If `va` is already mapped. A double map is a kernel bug.
    ///
    /// # Errors
    /// [`MapError::OutOfTableFrames`] when a table frame cannot be allocated.
    pub fn map_one<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        frame: PhysicalPage,
        leaf_flags: PageEntryBits,
    ) -> Result<(), MapError> {
        debug_assert!(va.is_page_aligned(), "mapping an unaligned address");

        let pd = self.directory_mut();
        let pde_idx = PageDirectory::index_of(va);
        let table_page = match pd.get(pde_idx).table() {
            Some(page) => page,
            None => {
                let page = alloc.alloc_frame().ok_or(MapError::OutOfTableFrames)?;
                self.zero_frame(page);
                pd.set(pde_idx, PdEntry::make_table(page, PageEntryBits::user_rw()));
                log::trace!("new page table {page:?} for directory slot {}", pde_idx.as_usize());
                page
            }
        };

        let pt = self.table_mut(table_page);
        let pte_idx = PageTable::index_of(va);
        assert!(
            !pt.get(pte_idx).is_present(),
            "virtual address {va} is already mapped"
        );
        pt.set(pte_idx, PtEntry::make(frame, leaf_flags));
        Ok(())
    }

    /// Translate a virtual address to its physical address, if mapped.
    ///
    /// The page-offset bits of `va` are preserved in the result.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let pd = self.directory_mut();
        let table_page = pd.get(PageDirectory::index_of(va)).table()?;
        let pt = self.table_mut(table_page);
        let (frame, _) = pt.get(PageTable::index_of(va)).page()?;
        Some(frame.join(va.page_offset()))
    }

    /// Remove the mapping at `va`, returning the frame it mapped.
    ///
    /// The caller owns TLB maintenance for active spaces, and owns returning
    /// the frame to its pool.
    ///
    /// # Panics
    /// If `va` is not mapped. Unmapping nothing is a kernel bug.
    pub fn unmap_one(&self, va: VirtualAddress) -> PhysicalPage {
        debug_assert!(va.is_page_aligned(), "unmapping an unaligned address");

        let pd = self.directory_mut();
        let table_page = pd
            .get(PageDirectory::index_of(va))
            .table()
            .unwrap_or_else(|| panic!("unmap of {va}: no page table covers it"));
        let pt = self.table_mut(table_page);
        let pte_idx = PageTable::index_of(va);
        let (frame, _) = pt
            .get(pte_idx)
            .page()
            .unwrap_or_else(|| panic!("unmap of {va}: not mapped"));
        pt.set(pte_idx, PtEntry::zero());
        frame
    }

    /// Zero the mapped page at `va` (page-aligned).
    ///
    /// Freshly allocated pages are scrubbed through this before being handed
    /// to callers.
    ///
    /// # Panics
    /// If `va` is not mapped.
    pub fn zero_page(&self, va: VirtualAddress) {
        debug_assert!(va.is_page_aligned(), "zeroing an unaligned page");
        let pa = self
            .translate(va)
            .unwrap_or_else(|| panic!("zero_page at {va}: not mapped"));
        // SAFETY: pa is page-aligned and mapped; we own the freshly mapped frame.
        let bytes: &mut [u8; PAGE_SIZE as usize] = unsafe { self.mapper.phys_to_mut(pa) };
        bytes.fill(0);
    }

    /// Write `value` into mapped memory at `va`.
    ///
    /// # Safety
    /// `va..va + size_of::<T>()` must be mapped, writable, and must not cross
    /// a page boundary (frames are not virtually contiguous).
    pub unsafe fn write<T>(&self, va: VirtualAddress, value: T) {
        debug_assert!(va.page_offset() as usize + size_of::<T>() <= PAGE_SIZE as usize);
        let pa = self
            .translate(va)
            .unwrap_or_else(|| panic!("write at {va}: not mapped"));
        unsafe { core::ptr::write(core::ptr::from_mut(self.mapper.phys_to_mut::<T>(pa)), value) };
    }

    /// Read a `T` from mapped memory at `va`.
    ///
    /// # Safety
    /// Same contract as [`write`](Self::write), plus the bytes must be a
    /// valid `T`.
    #[must_use]
    pub unsafe fn read<T: Copy>(&self, va: VirtualAddress) -> T {
        debug_assert!(va.page_offset() as usize + size_of::<T>() <= PAGE_SIZE as usize);
        let pa = self
            .translate(va)
            .unwrap_or_else(|| panic!("read at {va}: not mapped"));
        unsafe { core::ptr::read(core::ptr::from_ref(self.mapper.phys_to_mut::<T>(pa))) }
    }

    /// Load CR3 with this space's directory.
    ///
    /// # Safety
    /// The directory must map the currently executing code and stack; the
    /// scheduler only calls this with interrupts disabled, right before the
    /// context transfer.
    #[cfg(target_arch = "x86")]
    pub unsafe fn activate(&self) {
        let cr3 = self.root.base().as_u32();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}
