//! # Kernel Memory Bring-Up
//!
//! Glue between the boot handoff and the memory core: installs the debug
//! console logger, validates the handoff against the hardware, builds the
//! global [`MemoryManager`](kernel_alloc::MemoryManager) and hands out access
//! to it.
//!
//! ```rust,ignore
//! unsafe { kernel::memory::init_memory(&handoff, MemoryConfig::default()) };
//!
//! let page = kernel::memory::memory().alloc_page();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(target_arch = "x86_64")]
pub mod memory;
#[cfg(target_arch = "x86_64")]
pub mod platform;
