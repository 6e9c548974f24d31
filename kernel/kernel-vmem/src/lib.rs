//! # Virtual Memory Support
//!
//! Two-level x86 (32-bit, non-PAE) paging for the kernel.
//!
//! ## What you get
//! - An [`AddressSpace`] describing one page-directory-rooted mapping tree.
//! - Typed page-table layers: [`PageDirectory`] → [`PageTable`] → 4 KiB frame.
//! - Page-table entry flags as a real bitfield ([`PageEntryBits`]).
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]).
//!
//! ## 32-bit Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |   PD  |   PT  | Offset |
//! ```
//!
//! The CPU uses the first two fields as **indices** into two levels of page
//! tables, each level containing 1024 (2¹⁰) entries of 4 bytes each:
//!
//! ```text
//!  PD  →  PT  →  Physical Page
//!  │       │
//!  │       └───► PTE (Page Table Entry)     → maps one 4 KiB page
//!  └───────────► PDE (Page Directory Entry) → points to one PT
//! ```
//!
//! One page directory exists per address space, referenced by CR3. The final
//! offset field selects the byte inside the 4 KiB page, so a two-level walk
//! addresses exactly 4 GiB. Large (4 MiB) pages are deliberately not
//! supported; every present PDE points to a page table.
//!
//! ## No separate physical-access path
//!
//! Table frames are only ever touched through the [`PhysMapper`] seam. It
//! plays the role a recursive directory slot plays in self-mapped kernels:
//! there is exactly one way to turn a frame address into something readable,
//! and every table access uses it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

mod address_space;
mod page_table;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use address_space::{AddressSpace, MapError};
pub use page_table::{
    ENTRIES_PER_TABLE, PageDirectory, PageEntryBits, PageTable, PdEntry, PdIndex, PtEntry, PtIndex,
};

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

/// Minimal frame allocator used to obtain **physical** 4 KiB frames for page
/// tables.
///
/// The implementation decides where frames come from (bitmap pool, bump
/// region, test arena). Returns `None` on out-of-memory; table creation
/// treats that as a recoverable mapping failure.
pub trait FrameAlloc {
    fn alloc_frame(&mut self) -> Option<PhysicalPage>;
}

/// Converts physical addresses to usable pointers in the current virtual
/// address space.
///
/// The kernel's real implementation relies on physical memory being reachable
/// at a fixed offset; hosted tests substitute an in-memory arena. Either way,
/// this is the **only** route from a frame address to a reference.
///
/// # Safety
/// - `pa` must refer to memory that is mapped and writable for `&mut T`.
/// - `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference.
    ///
    /// # Safety
    /// See the trait-level contract.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}
