//! # Virtual Memory Support
//!
//! The x86-64 page-table engine of the kernel: walking, creating and
//! reverse-searching the single, shared kernel address space.
//!
//! ## What you get
//! - An [`AddressSpace`] rooted at a PML4 frame, with the virtual high-water
//!   mark of everything mapped so far.
//! - A 4 KiB-aligned [`PageTable`] used at every level, and its entry type.
//! - Collaborator traits: [`FrameAlloc`] supplies frames for new tables,
//!   [`PhysMapper`] makes a table frame accessible, [`Platform`] performs the
//!   hardware side effects.
//!
//! ## x86-64 Virtual Page → Physical Frame Walk
//!
//! Each 36-bit virtual page number is divided into four 9-bit fields:
//!
//! ```text
//! | 35‒27 | 26‒18 | 17‒9 |  8‒0 |
//! |  PML4 |  PDPT |  PD  |  PT  |
//! ```
//!
//! The CPU uses these fields as **indices** into four levels of page tables,
//! each level containing 512 (2⁹) entries of 8 bytes each.
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Frame
//! ```
//!
//! | Level | Table name | Entry points to |
//! |:------|:-----------|:----------------|
//! | 1 | **PML4** (Page Map Level 4) | a PDPT; the PML4 itself is referenced by CR3 |
//! | 2 | **PDPT** (Page Directory Pointer Table) | a PD |
//! | 3 | **PD** (Page Directory) | a PT |
//! | 4 | **PT** (Page Table) | a mapped 4 KiB frame |
//!
//! Only 4 KiB leaves exist; the PS bit is never set. All entries carry just
//! `PRESENT | WRITABLE` plus the frame number.
//!
//! ## Concurrency
//!
//! Nothing here locks. Mutating operations take `&mut AddressSpace`, so the
//! owner must serialize them. TLB invalidation only affects the calling core:
//! other cores may keep using stale translations until they re-walk.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_entry_bits;
pub mod page_table;

#[cfg(test)]
mod testing;

pub use crate::address_space::AddressSpace;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{PageTable, PageTableEntry, TableIndex, TableLevel};
use kernel_memory_addresses::{PhysicalPage, VirtualPage};

/// Minimal frame allocator used to obtain **physical** 4 KiB frames
/// for page tables.
///
/// The implementation decides where frames come from (the boot-time bump
/// allocator, or the section allocator later on).
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc {
    /// Allocate one 4 KiB *physical* frame for a page table.
    fn alloc_4k(&mut self) -> Option<PhysicalPage>;
}

/// Makes a page-table frame accessible from the current address space.
///
/// In the kernel this goes through the linear alias of the frame; on the host
/// it indexes simulated memory.
///
/// # Safety
/// - The returned table must be backed by the bytes of `frame`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`, and the caller must not create aliasing references to the
///   same frame.
pub trait PhysMapper {
    /// Access the page table stored in `frame`, or `None` if the frame is
    /// not reachable.
    ///
    /// # Safety
    /// `frame` must hold a page table (or be about to be initialized as one).
    unsafe fn table_mut<'a>(&self, frame: PhysicalPage) -> Option<&'a mut PageTable>;
}

/// Hardware capabilities needed by the memory core.
pub trait Platform {
    /// Drop any cached translation for `page` **on the calling core only**.
    ///
    /// There is no cross-core shootdown. Other cores may observe the previous
    /// translation until they re-walk the tables.
    fn invalidate_page(&self, page: VirtualPage);

    /// Stop the calling core for good: interrupts off, processor halted.
    fn halt(&self) -> !;
}

/// Failures of a mapping operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("out of frames for page tables")]
    OutOfFrames,
    #[error("page table in {0} is not reachable")]
    UnresolvedTable(PhysicalPage),
}
