//! # Bootloader Handoff
//!
//! The boot stage probes physical memory before paging is up and leaves the
//! byte-exact total at a fixed low-memory cell. The kernel reads it exactly
//! once, to size the physical pools.

/// Physical address of the `u32` cell holding total physical memory in bytes.
pub const TOTAL_MEMORY_CELL: u32 = 0xb00;

/// Read the boot-probed total physical memory size.
///
/// # Safety
/// Only valid on the real machine, after the boot stage has written the cell
/// and while the cell's page is identity-accessible. Hosted tests must pass a
/// synthetic total to the allocators instead of calling this.
#[must_use]
pub unsafe fn total_memory_bytes() -> u32 {
    // Volatile: the cell is written by earlier boot code the compiler never saw.
    unsafe { core::ptr::read_volatile(TOTAL_MEMORY_CELL as usize as *const u32) }
}
