//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// First virtual address owned by the kernel; user space ends here.
pub const KERNEL_SPLIT: u32 = 0xc000_0000;

/// Base of the kernel heap's virtual-page range.
///
/// Sits one MiB above the split so the kernel image mapping stays out of the
/// heap allocator's bitmap.
pub const KERNEL_HEAP_BASE: u32 = 0xc010_0000;

/// Physical bytes permanently claimed by the boot image (low 1 MiB).
pub const LOW_MEMORY_BYTES: u32 = 0x10_0000;

/// Page frames the boot stage spent on the page directory and its kernel
/// page tables: one directory page plus 255 tables covering the high range.
pub const BOOT_PAGE_TABLE_PAGES: u32 = 256;

/// Default virtual base of a user process image.
pub const USER_IMAGE_BASE: u32 = 0x0804_8000;

/// Highest pid value the pid bitmap can issue (pid 0 is never issued).
pub const MAX_PIDS: usize = 1024;

/// Per-task open-file table size; slots 0..3 are preopened as stdio.
pub const MAX_OPEN_FILES: usize = 8;

const _: () = {
    assert!(KERNEL_HEAP_BASE > KERNEL_SPLIT);
    assert!(KERNEL_SPLIT % PAGE_SIZE == 0);
    assert!(KERNEL_HEAP_BASE % PAGE_SIZE == 0);
    assert!(USER_IMAGE_BASE % PAGE_SIZE == 0);
    assert!(USER_IMAGE_BASE < KERNEL_SPLIT);
    assert!(MAX_PIDS % 8 == 0);
};
