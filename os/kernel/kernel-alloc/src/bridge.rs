//! # Frame Allocator Bridge
//!
//! After the linear pass, all further page allocation goes through a
//! section-based allocator. The bridge owns it, keeps the global count of
//! pages handed out, and adapts it to [`FrameAlloc`] so page tables can be
//! grown once the bootstrap allocator is gone.
//!
//! The section allocator works on *virtual* pages of the linear map. Physical
//! frames are recovered with `calculate_physical`.

use crate::phys_mapper::VirtualWindow;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_memory_addresses::{PhysicalPage, VirtualPage};
use kernel_mmap::{RegionTable, RegionTableView};
use kernel_vmem::FrameAlloc;

/// Failures while setting up a section allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SectionError {
    #[error("section exponent {0} is out of range")]
    InvalidExponent(u32),
    #[error("free memory needs more than {max} sections")]
    TooManySections { max: usize },
    #[error("no free memory to manage")]
    NoFreeMemory,
    #[error("allocator structures initialized before configuration")]
    NotConfigured,
}

/// The collaborator that manages free memory after bootstrap.
///
/// These six calls are everything the memory core needs from it. All
/// allocation calls take `&self`; implementations synchronise internally so
/// they can be used from any core.
pub trait SectionAllocator {
    /// Describe the memory to manage: the region table, the log2 of the
    /// largest section in pages, and the first linear page that is still free.
    ///
    /// # Errors
    /// A [`SectionError`] if the layout cannot be represented.
    fn configure(
        &mut self,
        regions: RegionTableView<'_>,
        exponent: u32,
        first_free: VirtualPage,
    ) -> Result<(), SectionError>;

    /// Build the bookkeeping structures inside the managed memory.
    ///
    /// # Errors
    /// [`SectionError::NotConfigured`] if [`configure`](Self::configure) has
    /// not succeeded yet.
    ///
    /// # Safety
    /// Every configured page must be mapped and reachable through `window`,
    /// and must not be in use by anything else.
    unsafe fn init_structures<W: VirtualWindow + ?Sized>(
        &mut self,
        window: &W,
    ) -> Result<(), SectionError>;

    /// Allocate one page.
    fn alloc_page(&self) -> Option<VirtualPage>;

    /// Return one page. Returns `false` (and changes nothing) if `page` was
    /// not allocated.
    fn free_page(&self, page: VirtualPage) -> bool;

    /// Allocate `pages` physically contiguous pages whose physical start is
    /// aligned to `pages.next_power_of_two()`.
    fn alloc_aligned(&self, pages: u64) -> Option<VirtualPage>;

    /// Return a run obtained from [`alloc_aligned`](Self::alloc_aligned).
    /// Returns `false` (and changes nothing) if the run was not allocated.
    fn free_aligned(&self, page: VirtualPage, pages: u64) -> bool;
}

/// Section allocator plus the global used-page counter.
#[derive(Debug)]
pub struct FrameBridge<S> {
    sections: S,
    used_pages: AtomicU64,
}

impl<S: SectionAllocator> FrameBridge<S> {
    /// Wrap an allocator that is already configured and initialized.
    #[must_use]
    pub const fn new(sections: S) -> Self {
        Self {
            sections,
            used_pages: AtomicU64::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub const fn sections(&self) -> &S {
        &self.sections
    }

    /// Pages currently handed out through the bridge.
    #[inline]
    #[must_use]
    pub fn used_pages(&self) -> u64 {
        self.used_pages.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn alloc_page(&self) -> Option<VirtualPage> {
        let page = self.sections.alloc_page()?;
        self.used_pages.fetch_add(1, Ordering::Relaxed);
        Some(page)
    }

    pub fn free_page(&self, page: VirtualPage) {
        if self.sections.free_page(page) {
            self.used_pages.fetch_sub(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn alloc_aligned(&self, pages: u64) -> Option<VirtualPage> {
        let page = self.sections.alloc_aligned(pages)?;
        self.used_pages.fetch_add(pages, Ordering::Relaxed);
        Some(page)
    }

    pub fn free_aligned(&self, page: VirtualPage, pages: u64) {
        if self.sections.free_aligned(page, pages) {
            self.used_pages.fetch_sub(pages, Ordering::Relaxed);
        }
    }

    /// A [`FrameAlloc`] handing out the frames behind bridge pages.
    #[inline]
    #[must_use]
    pub const fn frames<'a>(&'a self, regions: &'a RegionTable) -> BridgeFrames<'a, S> {
        BridgeFrames {
            bridge: self,
            regions,
        }
    }
}

/// Page-table frames from the section allocator.
pub struct BridgeFrames<'a, S> {
    bridge: &'a FrameBridge<S>,
    regions: &'a RegionTable,
}

impl<S: SectionAllocator> FrameAlloc for BridgeFrames<'_, S> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        let page = self.bridge.alloc_page()?;
        if let Some(frame) = self.regions.calculate_physical(page) {
            return Some(frame);
        }
        self.bridge.free_page(page);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::BitmapSectionAllocator;
    use crate::testing::FlatWindow;
    use kernel_mmap::PhysicalRegion;

    fn bridge(window: &FlatWindow, regions: &RegionTable) -> FrameBridge<BitmapSectionAllocator> {
        let mut sections = BitmapSectionAllocator::new();
        sections
            .configure(regions.view(), 4, VirtualPage::new(0))
            .unwrap();
        unsafe { sections.init_structures(window) }.unwrap();
        FrameBridge::new(sections)
    }

    #[test]
    fn used_pages_follow_alloc_and_free() {
        let regions = RegionTable::from_regions(&[PhysicalRegion::new(PhysicalPage::new(0), 64)]);
        let window = FlatWindow::with_pages(64);
        let bridge = bridge(&window, &regions);

        let mut pages = Vec::new();
        let mut last = bridge.used_pages();
        for _ in 0..20 {
            pages.push(bridge.alloc_page().expect("page"));
            assert!(bridge.used_pages() > last);
            last = bridge.used_pages();
        }
        assert_eq!(last, 20);

        for page in pages {
            bridge.free_page(page);
        }
        assert_eq!(bridge.used_pages(), 0);
    }

    #[test]
    fn double_free_keeps_the_count() {
        let regions = RegionTable::from_regions(&[PhysicalRegion::new(PhysicalPage::new(0), 32)]);
        let window = FlatWindow::with_pages(32);
        let bridge = bridge(&window, &regions);

        let page = bridge.alloc_page().unwrap();
        bridge.free_page(page);
        bridge.free_page(page);
        assert_eq!(bridge.used_pages(), 0);
    }

    #[test]
    fn aligned_runs_are_counted() {
        let regions = RegionTable::from_regions(&[PhysicalRegion::new(PhysicalPage::new(0), 64)]);
        let window = FlatWindow::with_pages(64);
        let bridge = bridge(&window, &regions);

        let run = bridge.alloc_aligned(3).expect("run");
        assert_eq!(bridge.used_pages(), 3);
        bridge.free_aligned(run, 3);
        assert_eq!(bridge.used_pages(), 0);
    }

    #[test]
    fn frames_come_from_the_linear_span() {
        let regions = RegionTable::from_regions(&[
            PhysicalRegion::new(PhysicalPage::new(0), 16),
            PhysicalRegion::new(PhysicalPage::new(0x80), 16),
        ]);
        let window = FlatWindow::with_pages(32);
        let bridge = bridge(&window, &regions);

        let mut frames = bridge.frames(&regions);
        let mut seen = Vec::new();
        while let Some(frame) = frames.alloc_4k() {
            assert!(regions.find(frame).is_some());
            seen.push(frame);
        }
        // Two sections of 16 pages, one bitmap page each.
        assert_eq!(seen.len(), 30);
        assert_eq!(bridge.used_pages(), 30);
    }
}
