//! # Thread and Process Scheduling
//!
//! Task control blocks, pid allocation and the round-robin scheduler.
//!
//! ## Model
//!
//! - Every schedulable entity — kernel thread or user process — is one
//!   [`Tcb`] in the scheduler's registry, plus one kernel page serving as its
//!   kernel stack. Processes additionally own a page directory and a
//!   virtual-address-space bitmap for their user region.
//! - The ready queue orders dispatch; priority sets the **length of a
//!   task's quantum**, not its place in the queue. The single exception is
//!   [`Scheduler::unblock`], which inserts at the head so a freshly woken
//!   task runs promptly.
//! - Exactly one task is `Running` at any time (single core). `Died` tasks
//!   are reaped immediately by the exit path; there is no zombie state.
//!
//! ## Concurrency
//!
//! Queue and registry mutation happens with interrupts disabled — on one
//! core that is atomicity. The scheduler asserts this at its entry points
//! instead of trusting callers. The low-level mechanics (interrupt flag,
//! stack switch, directory load, halt) are behind the [`Platform`] trait;
//! the scheduler never touches hardware itself.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod context;
mod pid;
mod platform;
mod scheduler;
mod task;

pub use context::{InterruptFrame, SwitchFrame, initial_frame_offset};
pub use pid::{Pid, PidPool};
pub use platform::{Platform, SoftPlatform};
pub use scheduler::Scheduler;
pub use task::{EntryFn, STACK_MAGIC, TaskInfo, TaskStatus, Tcb};
