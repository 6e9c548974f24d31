//! # Kernel synchronization primitives
//!
//! Two independent mutual-exclusion mechanisms, matching how they are used:
//!
//! - [`Mutex`] — a blocking lock for data that may be contended by several
//!   tasks, such as the physical-pool and pid bitmaps. Holding one never
//!   touches the interrupt flag, so long critical sections (zeroing a frame)
//!   do not cost interrupt latency.
//! - [`InterruptControl`] — the single-core substitute for a lock: scheduler
//!   queues are only ever mutated with interrupts disabled, which is
//!   sufficient because there is no second core to race with.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod raw_spin;

pub use irq::{InterruptControl, InterruptState, IrqGuard, SoftIrq};
#[cfg(target_arch = "x86")]
pub use irq::HardIrq;
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;

/// The lock used throughout the memory subsystem.
///
/// The acquire/release contract is all the allocators consume; the spin
/// implementation stands in for a sleep-based lock without changing callers.
pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

/// Acquire side of a raw lock.
pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

/// Release side of a raw lock.
pub trait RawUnlock {
    /// # Safety
    /// Must only be called by the holder of the lock.
    unsafe fn raw_unlock(&self);
}
