//! # Physical and Virtual Page Allocation
//!
//! The kernel's page-granular memory management, in three layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Page Allocator                        │
//! │   • reserve virtual range + allocate frames         │
//! │   • install mappings, zero-fill, all-or-nothing     │
//! └────────────┬──────────────────────┬─────────────────┘
//!              │                      │
//! ┌────────────▼───────────┐ ┌────────▼────────────────┐
//! │  Virtual Address Space │ │  Physical Memory Pools  │
//! │  • kernel heap bitmap  │ │  • kernel / user halves │
//! │  • per-process bitmap  │ │  • one bit per frame    │
//! └────────────┬───────────┘ └────────┬────────────────┘
//!              │                      │
//! ┌────────────▼──────────────────────▼─────────────────┐
//! │                    Bitmap                           │
//! │  • fixed-size bit vector, contiguous-run scan       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Pool and pid bitmaps sit behind blocking locks ([`kernel_sync::SpinMutex`])
//! rather than interrupt-disabled sections: several tasks may legitimately
//! contend for memory, and zeroing a freshly mapped frame under a closed
//! interrupt window would be unacceptable latency.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod bitmap;
mod page_alloc;
mod pool;
mod vaddr;

pub use bitmap::Bitmap;
pub use page_alloc::{PageAllocator, Space};
pub use pool::{MemoryPools, PhysicalPool};
pub use vaddr::VirtualAddressSpace;
