//! # Physical Memory Regions
//!
//! Discovers usable physical RAM from the boot memory map and provides the
//! arithmetic translation between physical frames and their linear virtual
//! aliases.
//!
//! * [`bootmem`]: parse the boot memory map into a [`RegionTable`].
//! * [`region`]: the sorted, non-overlapping region table and a byte-level
//!   [`RegionTableView`] of it.
//! * [`linear`]: `calculate_virtual` / `calculate_physical` over the table.
//!
//! The table is built once during memory initialization and is immutable
//! afterwards.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod bootmem;
pub mod linear;
pub mod region;

pub use bootmem::BootMemoryMap;
pub use region::{PhysicalRegion, RegionTable, RegionTableView};

/// Failures while discovering physical memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegionError {
    #[error("boot memory map at 0x{addr:X} is not in low memory")]
    BootMapOutOfReach { addr: u64 },
    #[error("no usable memory above the low-memory threshold")]
    NoUsableMemory,
}
