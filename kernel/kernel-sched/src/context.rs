//! Initial execution context for new tasks.
//!
//! A task that has never run has no saved state to restore, so `start()`
//! fabricates one: the top of the fresh kernel stack is laid out as if the
//! task had been switched away from at the platform trampoline. The layout
//! is the contract between this module and the context-transfer primitive —
//! nothing else reads these structs.
//!
//! All fields are `u32`: on the 32-bit target, registers, pointers and
//! function addresses coincide with `u32`. Hosted tests treat the frames as
//! plain data and never resume them.

use crate::EntryFn;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};

/// The interrupt-entry frame, as pushed by the interrupt stubs.
///
/// Occupies the fixed topmost region of every task's kernel stack page. The
/// interrupt layer owns its contents; the scheduler only reserves the room.
#[repr(C)]
pub struct InterruptFrame {
    pub vec_no: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Pushed by `pushad` but ignored by `popad`.
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub esp: u32,
    pub ss: u32,
}

/// The frame the context-transfer primitive saves and restores.
///
/// On every switch, the outgoing task's callee-saved registers and return
/// address sit in this shape on its own kernel stack. For a brand-new task,
/// [`SwitchFrame::initial`] fakes that state: `eip` points at the platform
/// trampoline, and the two trailing slots are what the trampoline — entered
/// by `ret`, not `call` — sees as its arguments.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct SwitchFrame {
    pub ebp: u32,
    pub ebx: u32,
    pub edi: u32,
    pub esi: u32,
    /// Resume address: the trampoline on first dispatch, a return address
    /// into `schedule()` ever after.
    pub eip: u32,
    /// Placeholder where the trampoline expects a return address.
    ret_pad: u32,
    /// The task body, invoked by the trampoline.
    pub function: u32,
    /// Argument passed to the task body.
    pub arg: u32,
}

impl SwitchFrame {
    /// Fabricate the first-dispatch frame for `entry(arg)`.
    #[must_use]
    pub fn initial(trampoline: VirtualAddress, entry: EntryFn, arg: usize) -> Self {
        Self {
            ebp: 0,
            ebx: 0,
            edi: 0,
            esi: 0,
            eip: trampoline.as_u32(),
            ret_pad: 0,
            function: entry as usize as u32,
            arg: arg as u32,
        }
    }
}

/// Byte offset inside a task's stack page where the initial [`SwitchFrame`]
/// lives: below the reserved [`InterruptFrame`] region at the very top.
#[must_use]
pub const fn initial_frame_offset() -> u32 {
    PAGE_SIZE - size_of::<InterruptFrame>() as u32 - size_of::<SwitchFrame>() as u32
}

const _: () = {
    assert!(size_of::<InterruptFrame>() == 19 * 4);
    assert!(size_of::<SwitchFrame>() == 8 * 4);
};

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn entry(_arg: usize) {}

    #[test]
    fn initial_frame_resumes_at_the_trampoline() {
        let tramp = VirtualAddress::new(0xc000_4000);
        let f = SwitchFrame::initial(tramp, entry, 42);
        assert_eq!(f.eip, tramp.as_u32());
        assert_eq!(f.arg, 42);
        assert_eq!((f.ebp, f.ebx, f.edi, f.esi), (0, 0, 0, 0));
    }

    #[test]
    fn frame_sits_below_the_interrupt_region() {
        let off = initial_frame_offset();
        assert_eq!(
            off as usize + size_of::<SwitchFrame>() + size_of::<InterruptFrame>(),
            PAGE_SIZE as usize
        );
    }
}
