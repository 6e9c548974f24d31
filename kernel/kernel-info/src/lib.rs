//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for the kernel's memory-layout constants and the
//! bootloader handoff contract. Centralizing these here keeps the allocators,
//! the paging code and the scheduler agreeing on one layout and prevents
//! configuration drift between subsystems.
//!
//! ## Virtual address space layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │         User Space              │
//!             │   (process image and heap)      │
//! KERNEL_SPLIT├─────────────────────────────────┤ 0xc000_0000
//!             │   Kernel image (low 1 MiB,      │
//!             │    mapped at the split)         │
//! KERNEL_HEAP_│─────────────────────────────────│ 0xc010_0000
//!        BASE │   Kernel heap (page granular)   │
//! 0xffff_ffff └─────────────────────────────────┘
//! ```
//!
//! Everything at or above [`memory::KERNEL_SPLIT`] belongs to the kernel and
//! is shared across all address spaces; user reservations must land strictly
//! below it.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot;
pub mod memory;
