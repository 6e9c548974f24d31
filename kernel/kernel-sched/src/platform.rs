//! The hardware seam consumed by the scheduler.
//!
//! Dispatch needs four things from the machine: interrupt-flag control, the
//! stack-switch primitive, page-directory activation and a low-power halt.
//! [`Platform`] bundles them so the scheduler logic contains no `asm!` and
//! can be exercised on a development host. The boot layer provides the real
//! implementation; [`SoftPlatform`] is the software stand-in for hosted
//! tests and bring-up.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::{InterruptControl, SoftIrq};

/// Everything the scheduler asks of the machine.
pub trait Platform: InterruptControl {
    /// Address of the first-dispatch trampoline.
    ///
    /// The trampoline runs on the new task's stack with interrupts disabled,
    /// re-enables them, and calls the task body with its argument (both taken
    /// from the [`crate::SwitchFrame`] it was entered through).
    fn trampoline(&self) -> VirtualAddress;

    /// Transfer execution between kernel stacks.
    ///
    /// Saves the outgoing context and stores its stack pointer through
    /// `save_to` (`None` when the outgoing task has already been reaped),
    /// then resumes whatever `resume_from` was saved pointing at.
    ///
    /// # Safety
    /// Must be called with interrupts disabled; `resume_from` must hold a
    /// valid [`crate::SwitchFrame`] or an earlier save point.
    unsafe fn context_switch(
        &self,
        save_to: Option<*mut VirtualAddress>,
        resume_from: VirtualAddress,
    );

    /// Load the incoming task's page directory; `None` selects the kernel
    /// directory. Runs with interrupts disabled, immediately before the
    /// context transfer.
    fn activate_address_space(&self, directory: Option<PhysicalAddress>);

    /// Wait for the next interrupt in a low-power state.
    fn halt(&self);
}

/// Software-only [`Platform`].
///
/// Context switches complete instantly (control simply returns), the
/// interrupt flag is a plain boolean, and every action is counted so tests
/// can observe dispatch behavior. `exit(_, true)` cannot be modelled — it
/// relies on a switch that never returns — and stays the real platform's
/// territory.
pub struct SoftPlatform {
    irq: SoftIrq,
    switches: AtomicUsize,
    halts: AtomicUsize,
    /// Last activated directory; `u64::MAX` encodes "kernel directory".
    activated: AtomicU64,
}

extern "C" fn soft_trampoline() {
    // Never executed; only its address is taken.
}

impl SoftPlatform {
    /// A platform with interrupts initially enabled, as after boot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            irq: SoftIrq::new(true),
            switches: AtomicUsize::new(0),
            halts: AtomicUsize::new(0),
            activated: AtomicU64::new(u64::MAX),
        }
    }

    /// Completed context switches.
    #[must_use]
    pub fn switch_count(&self) -> usize {
        self.switches.load(Ordering::Acquire)
    }

    /// Halt invocations.
    #[must_use]
    pub fn halt_count(&self) -> usize {
        self.halts.load(Ordering::Acquire)
    }

    /// The directory argument of the most recent activation.
    #[must_use]
    pub fn last_activated(&self) -> Option<PhysicalAddress> {
        match self.activated.load(Ordering::Acquire) {
            u64::MAX => None,
            pa => Some(PhysicalAddress::new(pa as u32)),
        }
    }
}

impl Default for SoftPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptControl for SoftPlatform {
    fn disable(&self) -> kernel_sync::InterruptState {
        self.irq.disable()
    }

    fn restore(&self, prior: kernel_sync::InterruptState) {
        self.irq.restore(prior);
    }

    fn is_enabled(&self) -> bool {
        self.irq.is_enabled()
    }
}

impl Platform for SoftPlatform {
    fn trampoline(&self) -> VirtualAddress {
        VirtualAddress::new(soft_trampoline as usize as u32)
    }

    unsafe fn context_switch(
        &self,
        _save_to: Option<*mut VirtualAddress>,
        _resume_from: VirtualAddress,
    ) {
        self.switches.fetch_add(1, Ordering::AcqRel);
    }

    fn activate_address_space(&self, directory: Option<PhysicalAddress>) {
        let raw = directory.map_or(u64::MAX, |pa| u64::from(pa.as_u32()));
        self.activated.store(raw, Ordering::Release);
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::AcqRel);
    }
}
