//! # Bootstrap-Only Frame Allocator
//!
//! A bump allocator over the region table that only ever moves forward.
//! It supplies page-table frames while the linear map is being built and is
//! dropped as soon as the section allocator takes over.
//!
//! The cursor starts at the last frame the bring-up stage consumed. The next
//! frame is the following page of the same region, or the first page of the
//! next region once the current one is exhausted.
//!
//! ⚠️ Frames handed out here are never returned. Everything below the cursor
//! at hand-over time stays allocated for good.

use kernel_memory_addresses::PhysicalPage;
use kernel_mmap::RegionTable;
use kernel_vmem::FrameAlloc;

pub struct BootstrapFrameAlloc<'r> {
    regions: &'r RegionTable,
    last: PhysicalPage,
}

impl<'r> BootstrapFrameAlloc<'r> {
    /// Continue after `last`, the most recently consumed frame.
    #[inline]
    #[must_use]
    pub const fn new(regions: &'r RegionTable, last: PhysicalPage) -> Self {
        Self { regions, last }
    }

    /// The most recently handed out frame.
    #[inline]
    #[must_use]
    pub const fn watermark(&self) -> PhysicalPage {
        self.last
    }

    /// The frame the next allocation would return, without taking it.
    ///
    /// `None` if the watermark lies in no region or the last region is
    /// exhausted.
    #[must_use]
    pub fn peek(&self) -> Option<PhysicalPage> {
        let (index, region) = self.regions.find(self.last)?;
        let next = self.last.next();
        if next < region.end() {
            return Some(next);
        }
        self.regions.as_slice().get(index + 1).map(|r| r.start)
    }
}

impl FrameAlloc for BootstrapFrameAlloc<'_> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        let next = self.peek()?;
        self.last = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_mmap::PhysicalRegion;

    fn regions() -> RegionTable {
        RegionTable::from_regions(&[
            PhysicalRegion::new(PhysicalPage::new(0), 4),
            PhysicalRegion::new(PhysicalPage::new(100), 2),
        ])
    }

    #[test]
    fn bumps_within_and_across_regions() {
        let regions = regions();
        let mut alloc = BootstrapFrameAlloc::new(&regions, PhysicalPage::new(1));

        let frames: Vec<_> = core::iter::from_fn(|| alloc.alloc_4k())
            .map(PhysicalPage::number)
            .collect();
        assert_eq!(frames, [2, 3, 100, 101]);
        assert_eq!(alloc.watermark(), PhysicalPage::new(101));
        assert_eq!(alloc.peek(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let regions = regions();
        let mut alloc = BootstrapFrameAlloc::new(&regions, PhysicalPage::new(3));
        assert_eq!(alloc.peek(), Some(PhysicalPage::new(100)));
        assert_eq!(alloc.peek(), Some(PhysicalPage::new(100)));
        assert_eq!(alloc.alloc_4k(), Some(PhysicalPage::new(100)));
    }

    #[test]
    fn watermark_outside_regions_fails() {
        let regions = regions();
        let mut alloc = BootstrapFrameAlloc::new(&regions, PhysicalPage::new(50));
        assert_eq!(alloc.alloc_4k(), None);
        assert_eq!(alloc.watermark(), PhysicalPage::new(50));
    }
}
