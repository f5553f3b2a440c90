//! # Reaching Physical Memory Through the Linear Map
//!
//! Code can only dereference virtual addresses. Once the linear map exists,
//! every frame listed in the region table has a fixed virtual alias, so a
//! page table stored in frame `f` is found at `calculate_virtual(f)`.
//!
//! Turning that virtual page into a pointer is the job of a
//! [`VirtualWindow`]. In the kernel virtual addresses are used as they are
//! ([`DirectWindow`]); host tests substitute a window that walks simulated
//! page tables.
//!
//! During bring-up only the first linear pages are mapped (identity), which
//! is enough to reach the tables the bootstrap allocator hands out.

use kernel_memory_addresses::{PhysicalPage, VirtualPage};
use kernel_mmap::RegionTable;
use kernel_vmem::{PageTable, PhysMapper};

/// Turns a mapped virtual page into a byte pointer for the CPU.
pub trait VirtualWindow {
    /// Pointer to the first byte of `page`.
    ///
    /// Dereferencing it is only valid while `page` is mapped.
    fn page_ptr(&self, page: VirtualPage) -> *mut u8;
}

impl<W: VirtualWindow + ?Sized> VirtualWindow for &W {
    #[inline]
    fn page_ptr(&self, page: VirtualPage) -> *mut u8 {
        (**self).page_ptr(page)
    }
}

/// The running kernel's window: a virtual page is its own address.
#[derive(Debug, Default, Copy, Clone)]
pub struct DirectWindow;

impl VirtualWindow for DirectWindow {
    #[inline]
    fn page_ptr(&self, page: VirtualPage) -> *mut u8 {
        page.base().as_mut_ptr()
    }
}

/// [`PhysMapper`] that reaches table frames through their linear alias.
///
/// Frames outside the region table cannot be resolved.
pub struct LinearMapper<'a, W: ?Sized> {
    regions: &'a RegionTable,
    window: &'a W,
}

impl<'a, W: VirtualWindow + ?Sized> LinearMapper<'a, W> {
    #[inline]
    #[must_use]
    pub const fn new(regions: &'a RegionTable, window: &'a W) -> Self {
        Self { regions, window }
    }
}

impl<W: VirtualWindow + ?Sized> PhysMapper for LinearMapper<'_, W> {
    unsafe fn table_mut<'t>(&self, frame: PhysicalPage) -> Option<&'t mut PageTable> {
        let page = self.regions.calculate_virtual(frame)?;
        let table = self.window.page_ptr(page).cast::<PageTable>();
        // SAFETY: the caller guarantees `frame` holds a page table; its linear
        // alias is mapped and page aligned.
        Some(unsafe { &mut *table })
    }
}
