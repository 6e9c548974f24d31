//! Interrupt-flag control.
//!
//! On a single core, disabling interrupts makes a critical section atomic
//! with respect to preemption, so the scheduler's queues need no lock — they
//! need this. The trait keeps the scheduler independent of the concrete
//! mechanism: the real implementation drives `cli`/`sti`, hosted tests flip
//! a flag.

use core::sync::atomic::{AtomicBool, Ordering};

/// Snapshot of the interrupt flag, returned by [`InterruptControl::disable`]
/// and consumed by [`InterruptControl::restore`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InterruptState {
    Enabled,
    Disabled,
}

/// The interrupt-control contract consumed by the scheduler.
///
/// `disable` returns the *prior* state so nested critical sections compose:
/// each section restores exactly what it found.
pub trait InterruptControl {
    fn disable(&self) -> InterruptState;
    fn restore(&self, prior: InterruptState);
    fn is_enabled(&self) -> bool;
}

/// RAII critical section: disables interrupts on creation, restores the
/// prior state on drop.
pub struct IrqGuard<'c, C: InterruptControl> {
    ctl: &'c C,
    prior: InterruptState,
}

impl<'c, C: InterruptControl> IrqGuard<'c, C> {
    #[must_use]
    pub fn new(ctl: &'c C) -> Self {
        let prior = ctl.disable();
        Self { ctl, prior }
    }
}

impl<C: InterruptControl> Drop for IrqGuard<'_, C> {
    fn drop(&mut self) {
        self.ctl.restore(self.prior);
    }
}

/// Software interrupt flag.
///
/// Stands in for the hardware flag wherever `cli`/`sti` cannot run: hosted
/// tests, and bring-up stages before the interrupt controller is programmed.
pub struct SoftIrq {
    enabled: AtomicBool,
}

impl SoftIrq {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl InterruptControl for SoftIrq {
    fn disable(&self) -> InterruptState {
        if self.enabled.swap(false, Ordering::AcqRel) {
            InterruptState::Enabled
        } else {
            InterruptState::Disabled
        }
    }

    fn restore(&self, prior: InterruptState) {
        self.enabled
            .store(prior == InterruptState::Enabled, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Hardware interrupt flag (`cli`/`sti`/`pushfd`).
///
/// Must run at CPL0; calling from user mode is invalid.
#[cfg(target_arch = "x86")]
pub struct HardIrq;

#[cfg(target_arch = "x86")]
impl InterruptControl for HardIrq {
    fn disable(&self) -> InterruptState {
        let was = self.is_enabled();
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) };
        if was {
            InterruptState::Enabled
        } else {
            InterruptState::Disabled
        }
    }

    fn restore(&self, prior: InterruptState) {
        if prior == InterruptState::Enabled {
            unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) };
        }
    }

    fn is_enabled(&self) -> bool {
        let eflags: u32;
        unsafe {
            core::arch::asm!("pushfd; pop {}", out(reg) eflags, options(nostack, preserves_flags));
        }
        eflags & (1 << 9) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_prior_state() {
        let irq = SoftIrq::new(true);
        {
            let _g = IrqGuard::new(&irq);
            assert!(!irq.is_enabled());
            {
                // Nested sections restore what they found, not "enabled".
                let _g2 = IrqGuard::new(&irq);
                assert!(!irq.is_enabled());
            }
            assert!(!irq.is_enabled());
        }
        assert!(irq.is_enabled());
    }

    #[test]
    fn disable_reports_prior_state() {
        let irq = SoftIrq::new(false);
        assert_eq!(irq.disable(), InterruptState::Disabled);
        irq.restore(InterruptState::Enabled);
        assert_eq!(irq.disable(), InterruptState::Enabled);
    }
}
