//! Typed page-directory and page-table layers.
//!
//! - [`PdIndex`] / [`PtIndex`]: index types for VA bits `[31:22]` / `[21:12]`.
//! - [`PdEntry`]: a directory entry; present entries point to a page table.
//! - [`PtEntry`]: a table entry; present entries map one 4 KiB frame.
//! - [`PageDirectory`] / [`PageTable`]: 4 KiB-aligned arrays of 1024 entries.
//!
//! Raw constructors do not validate consistency; prefer the typed helpers.
//! After modifying active mappings the caller owns TLB maintenance.

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};

/// Entries per directory or table (2¹⁰).
pub const ENTRIES_PER_TABLE: usize = 1024;

/// A single 32-bit paging entry in its raw bitfield form.
///
/// Models the common superset of PDE and PTE fields. A caller composes the
/// permission bits and lets [`PdEntry::make_table`] / [`PtEntry::make`] force
/// `present` and write the frame bits.
///
/// | Bits  | Name | Meaning |
/// |-------|------|---------|
/// | 0     | `P`  | Valid entry if set |
/// | 1     | `RW` | Writable if set |
/// | 2     | `US` | User-mode accessible if set |
/// | 3     | `PWT`| Write-through caching |
/// | 4     | `PCD`| Disable caching |
/// | 5     | `A`  | Accessed |
/// | 6     | `D`  | Dirty (PTE only) |
/// | 7     | `PS` | Large page; always 0 here (4 MiB pages unsupported) |
/// | 8     | `G`  | Global (PTE only) |
/// | 9–11  | —    | Available to the OS |
/// | 12–31 | addr | Physical frame bits `[31:12]` |
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,
    /// Writable (RW, bit 1).
    pub writable: bool,
    /// User/Supervisor (US, bit 2). Clear restricts to supervisor access.
    pub user_access: bool,
    /// Write-through caching (PWT, bit 3).
    pub write_through: bool,
    /// Cache disable (PCD, bit 4).
    pub cache_disable: bool,
    /// Accessed (A, bit 5); set by the processor.
    pub accessed: bool,
    /// Dirty (D, bit 6); set by the processor on write, leaf entries only.
    pub dirty: bool,
    /// Page size (PS, bit 7); must stay clear, only 4 KiB mappings exist.
    pub large_page: bool,
    /// Global (G, bit 8); leaf entries only.
    pub global: bool,
    /// Bits 9–11, ignored by the MMU.
    #[bits(3)]
    pub os_avail: u8,
    /// Physical frame index (address bits `[31:12]`).
    #[bits(20)]
    pub frame: u32,
}

impl PageEntryBits {
    /// Frame referenced by this entry.
    #[must_use]
    pub const fn physical_page(self) -> PhysicalPage {
        PhysicalPage::from_index(self.frame())
    }

    /// Supervisor-only read/write permissions, the kernel-mapping default.
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_writable(true)
    }

    /// User-accessible read/write permissions.
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new().with_writable(true).with_user_access(true)
    }
}

/// Index into the page directory (VA bits `[31:22]`).
///
/// Strongly typed to avoid mixing with the table level. Range is `0..1024`,
/// checked in debug builds.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PdIndex(u16);

/// Index into a page table (VA bits `[21:12]`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PtIndex(u16);

impl PdIndex {
    /// Extract the directory index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 22) & 0x3ff) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < ENTRIES_PER_TABLE as u16);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl PtIndex {
    /// Extract the table index from a virtual address.
    #[inline]
    #[must_use]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(((va.as_u32() >> 12) & 0x3ff) as u16)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < ENTRIES_PER_TABLE as u16);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A page-directory entry (PDE).
///
/// A present PDE points to a page table; it never maps memory directly.
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct PdEntry(PageEntryBits);

/// A page-table entry (PTE). A present PTE maps exactly one 4 KiB frame.
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct PtEntry(PageEntryBits);

impl PdEntry {
    /// A zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// If present, the page table this entry points to.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalPage> {
        if self.is_present() {
            Some(self.0.physical_page())
        } else {
            None
        }
    }

    /// Create a PDE pointing at `table`, forcing `present=1` and `PS=0`.
    #[inline]
    #[must_use]
    pub const fn make_table(table: PhysicalPage, flags: PageEntryBits) -> Self {
        Self(
            flags
                .with_present(true)
                .with_large_page(false)
                .with_frame(table.index()),
        )
    }

    /// Expose the underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }
}

impl PtEntry {
    /// A zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// If present, the mapped frame and its flags.
    #[inline]
    #[must_use]
    pub const fn page(self) -> Option<(PhysicalPage, PageEntryBits)> {
        if self.is_present() {
            Some((self.0.physical_page(), self.0))
        } else {
            None
        }
    }

    /// Create a leaf PTE mapping `frame`, forcing `present=1` and `PS=0`.
    #[inline]
    #[must_use]
    pub const fn make(frame: PhysicalPage, flags: PageEntryBits) -> Self {
        Self(
            flags
                .with_present(true)
                .with_large_page(false)
                .with_frame(frame.index()),
        )
    }

    /// Expose the underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }
}

/// The page directory: 1024 PDEs, 4 KiB-aligned, one per address space.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

/// A page table: 1024 PTEs, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

impl PageDirectory {
    #[inline]
    #[must_use]
    pub const fn get(&self, i: PdIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PdIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }

    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> PdIndex {
        PdIndex::from(va)
    }
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn get(&self, i: PtIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: PtIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    #[inline]
    #[must_use]
    pub const fn index_of(va: VirtualAddress) -> PtIndex {
        PtIndex::from(va)
    }
}

const _: () = {
    assert!(size_of::<PageDirectory>() == PAGE_SIZE as usize);
    assert!(size_of::<PageTable>() == PAGE_SIZE as usize);
    assert!(size_of::<PtEntry>() == 4);
};
