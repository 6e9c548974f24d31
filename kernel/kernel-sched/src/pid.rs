//! Pid allocation.
//!
//! A dedicated bitmap over [`MAX_PIDS`] identifiers behind its own lock.
//! Pids start at 1 — pid 0 stays unissued forever — and are reusable as soon
//! as they are released.

use core::fmt;
use kernel_alloc::Bitmap;
use kernel_info::memory::MAX_PIDS;
use kernel_sync::SpinMutex;

/// A process or thread identifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Pid(u32);

impl Pid {
    pub(crate) const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

/// The process-wide pid pool.
pub struct PidPool {
    bitmap: SpinMutex<Bitmap>,
    start: u32,
}

impl PidPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bitmap: SpinMutex::new(Bitmap::new(MAX_PIDS / 8)),
            start: 1,
        }
    }

    /// Issue the lowest free pid.
    ///
    /// # Panics
    /// When all [`MAX_PIDS`] identifiers are live. There is no reuse-pressure
    /// policy beyond [`release`](Self::release); running out is fatal.
    pub fn allocate(&self) -> Pid {
        let mut bitmap = self.bitmap.lock();
        let bit = bitmap.scan(1).expect("pid space exhausted");
        bitmap.set(bit, true);
        Pid(self.start + bit as u32)
    }

    /// Return a pid to the pool.
    ///
    /// # Panics
    /// If `pid` was never issued.
    pub fn release(&self, pid: Pid) {
        assert!(pid.0 >= self.start, "pid {pid} below the pool range");
        let bit = (pid.0 - self.start) as usize;
        let mut bitmap = self.bitmap.lock();
        assert!(bitmap.test(bit), "releasing pid {pid} that is not live");
        bitmap.set(bit, false);
    }
}

impl Default for PidPool {
    fn default() -> Self {
        Self::new()
    }
}
