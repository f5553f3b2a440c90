//! # Kernel Memory Configuration and Boot Handoff
//!
//! Shared definitions that the bring-up stage and the kernel's memory core
//! must agree on: the boot memory-map record format, the handoff structure
//! passed to memory initialization, and the compile-time layout constants.
//!
//! ## Overview
//!
//! The memory core runs exactly once per boot and depends on a handful of
//! facts established before it: where the boot memory map lives, which frame
//! holds the top-level page table, and how far the bring-up stage has already
//! mapped and consumed memory. Instead of reading those from fixed addresses,
//! they are collected in a single [`MemoryHandoff`](boot::MemoryHandoff) and
//! passed in once.
//!
//! ## Modules
//!
//! ### Boot Handoff ([`boot`])
//! * **`MemoryHandoff`**: `#[repr(C)]` structure filled by the bring-up stage
//! * **`MemoryMapInfo`**: location and byte length of the boot memory map
//!
//! ### Boot Memory-Map Records ([`mmap`])
//! * **`MmapRecord`**: one `{size, base_addr, length, type}` record
//! * **`MmapRecords`**: iterator over the densely packed record stream
//!
//! ### Memory Layout ([`memory`])
//! * **Low-memory threshold**: memory below 1 MiB belongs to the bring-up
//!   identity map and is folded into the region starting at page 0
//! * **Table limits**: region-table capacity, section limits
//! * **`MemoryConfig`**: run-time tunables with sensible defaults
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1 MiB)        │
//!             │  boot map, bring-up page tables │
//! 0x0010_0000 ├─────────────────────────────────┤ LOW_MEMORY_LIMIT
//!             │    Available RAM                │
//!             │  (linearly mapped at boot)      │
//!             └─────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::boot::{MemoryHandoff, MemoryMapInfo};
//! use kernel_info::memory::LOW_MEMORY_LIMIT;
//!
//! let handoff = MemoryHandoff {
//!     mmap: MemoryMapInfo { mmap_addr: 0x9000, mmap_length: 48 },
//!     page_table_root: 0x1,
//!     last_physical_frame: 0x4,
//!     last_virtual_page: 0x1FF,
//! };
//! assert!(handoff.mmap.mmap_addr < LOW_MEMORY_LIMIT);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod mmap;
