//! # Kernel synchronization primitives
//!
//! * [`SpinLock`]: a fair ticket lock handing out RAII guards. Waiters are
//!   served in arrival order, so no core starves while another keeps
//!   re-acquiring.
//! * [`SyncOnceCell`]: a write-once cell for kernel globals that are set up
//!   during initialization and only read afterwards.
//!
//! Neither primitive masks interrupts. Locks taken from interrupt context
//! must not also be taken with interrupts enabled.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
