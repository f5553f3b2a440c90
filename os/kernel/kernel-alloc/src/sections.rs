//! # Bitmap Section Allocator
//!
//! Manages the free part of the linear span after bootstrap.
//!
//! ```text
//! linear span:  [ bootstrap-owned | free ............................ )
//!                                 ^ first_free
//! sections:                       [ S0 ≤ 2^e ][ S1 ≤ 2^e ][ S2 ][ S3 ...
//!                                         region boundary ┘
//! ```
//!
//! The free span is cut into sections of at most `2^exponent` pages. A
//! section never crosses a region boundary, so any run of pages inside one
//! section is physically contiguous as well.
//!
//! Each section keeps its allocation bitmap (one bit per page, set = used) in
//! its own first page, which is marked used from the start. A single page of
//! bitmap covers 32768 pages, which bounds the exponent at 15.
//!
//! All bookkeeping sits behind one [`SpinLock`].

use crate::bridge::{SectionAllocator, SectionError};
use crate::phys_mapper::VirtualWindow;
use kernel_info::memory::MAX_SECTIONS;
use kernel_memory_addresses::{PAGE_SHIFT, VirtualPage};
use kernel_mmap::RegionTableView;
use kernel_sync::SpinLock;
use log::{debug, info, warn};

/// Largest supported section exponent: one bitmap page per section.
pub const MAX_SECTION_EXPONENT: u32 = PAGE_SHIFT + 3;

const BITMAP_WORDS: usize = 1 << (PAGE_SHIFT - 3);

type Bitmap = [u64; BITMAP_WORDS];

#[derive(Debug, Copy, Clone)]
struct Section {
    /// First linear page.
    virt: u64,
    /// Frame behind `virt`.
    phys: u64,
    pages: u64,
    free: u64,
    /// Where the next single-page search starts.
    hint: u64,
    bitmap: *mut Bitmap,
}

impl Section {
    const EMPTY: Self = Self {
        virt: 0,
        phys: 0,
        pages: 0,
        free: 0,
        hint: 1,
        bitmap: core::ptr::null_mut(),
    };

    const fn contains(&self, page: VirtualPage) -> bool {
        self.virt <= page.number() && page.number() < self.virt + self.pages
    }

    fn bits(&self) -> &Bitmap {
        // SAFETY: set up by `init_structures`; the page belongs to this
        // section alone and is only touched with the state lock held.
        unsafe { &*self.bitmap }
    }

    fn bits_mut(&mut self) -> &mut Bitmap {
        // SAFETY: as in `bits`.
        unsafe { &mut *self.bitmap }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn is_used(&self, index: u64) -> bool {
        self.bits()[(index / 64) as usize] & (1 << (index % 64)) != 0
    }

    fn all_free(&self, index: u64, pages: u64) -> bool {
        (index..index + pages).all(|i| !self.is_used(i))
    }

    fn all_used(&self, index: u64, pages: u64) -> bool {
        (index..index + pages).all(|i| self.is_used(i))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mark(&mut self, index: u64, pages: u64, used: bool) {
        let bits = self.bits_mut();
        for i in index..index + pages {
            let (word, bit) = ((i / 64) as usize, 1 << (i % 64));
            if used {
                bits[word] |= bit;
            } else {
                bits[word] &= !bit;
            }
        }
    }

    fn take(&mut self, index: u64, pages: u64) -> VirtualPage {
        self.mark(index, pages, true);
        self.free -= pages;
        self.hint = if index + pages < self.pages {
            index + pages
        } else {
            1
        };
        VirtualPage::new(self.virt + index)
    }

    fn release(&mut self, index: u64, pages: u64) {
        self.mark(index, pages, false);
        self.free += pages;
        self.hint = self.hint.min(index);
    }

    fn find_free(&self) -> Option<u64> {
        (self.hint..self.pages)
            .chain(1..self.hint)
            .find(|&i| !self.is_used(i))
    }

    /// First free run of `pages` whose frame is a multiple of `align`.
    fn find_aligned(&self, pages: u64, align: u64) -> Option<u64> {
        // Index 0 holds the bitmap.
        let mut index = (self.phys + 1).next_multiple_of(align) - self.phys;
        while index + pages <= self.pages {
            if self.all_free(index, pages) {
                return Some(index);
            }
            index += align;
        }
        None
    }
}

struct SectionState {
    sections: [Section; MAX_SECTIONS],
    count: usize,
    ready: bool,
}

// SAFETY: the bitmap pointers refer to kernel memory owned by the allocator;
// they are only dereferenced with the lock held.
unsafe impl Send for SectionState {}

impl SectionState {
    fn active(&mut self) -> &mut [Section] {
        if self.ready {
            &mut self.sections[..self.count]
        } else {
            &mut []
        }
    }

    fn owner(&mut self, page: VirtualPage) -> Option<&mut Section> {
        self.active().iter_mut().find(|s| s.contains(page))
    }
}

/// A [`SectionAllocator`] keeping one bitmap per section.
pub struct BitmapSectionAllocator {
    state: SpinLock<SectionState>,
}

impl Default for BitmapSectionAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapSectionAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SpinLock::new(SectionState {
                sections: [Section::EMPTY; MAX_SECTIONS],
                count: 0,
                ready: false,
            }),
        }
    }

    /// Number of configured sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.state.lock().count
    }

    /// Pages still available across all sections.
    #[must_use]
    pub fn free_pages(&self) -> u64 {
        self.state.lock().active().iter().map(|s| s.free).sum()
    }

    fn layout(
        state: &mut SectionState,
        regions: RegionTableView<'_>,
        exponent: u32,
        first_free: VirtualPage,
    ) -> Result<(), SectionError> {
        let span = 1u64 << exponent;
        let mut virt = 0u64;

        for (start, length) in regions.iter() {
            let region_end = virt + length;
            let mut cursor = virt.max(first_free.number());

            while cursor < region_end {
                let pages = span.min(region_end - cursor);
                if pages < 2 {
                    debug!("no room for a section at linear page 0x{cursor:X}");
                } else {
                    if state.count == MAX_SECTIONS {
                        return Err(SectionError::TooManySections { max: MAX_SECTIONS });
                    }
                    state.sections[state.count] = Section {
                        virt: cursor,
                        phys: start.number() + (cursor - virt),
                        pages,
                        ..Section::EMPTY
                    };
                    state.count += 1;
                }
                cursor += pages;
            }
            virt = region_end;
        }

        if state.count == 0 {
            return Err(SectionError::NoFreeMemory);
        }
        Ok(())
    }
}

impl SectionAllocator for BitmapSectionAllocator {
    fn configure(
        &mut self,
        regions: RegionTableView<'_>,
        exponent: u32,
        first_free: VirtualPage,
    ) -> Result<(), SectionError> {
        if exponent == 0 || exponent > MAX_SECTION_EXPONENT {
            return Err(SectionError::InvalidExponent(exponent));
        }

        let state = self.state.get_mut();
        state.count = 0;
        state.ready = false;

        if let Err(e) = Self::layout(state, regions, exponent, first_free) {
            state.count = 0;
            return Err(e);
        }

        info!(
            "section allocator: {} sections of up to {} pages from {}",
            state.count,
            1u64 << exponent,
            first_free
        );
        Ok(())
    }

    unsafe fn init_structures<W: VirtualWindow + ?Sized>(
        &mut self,
        window: &W,
    ) -> Result<(), SectionError> {
        let state = self.state.get_mut();
        if state.count == 0 {
            return Err(SectionError::NotConfigured);
        }

        for section in &mut state.sections[..state.count] {
            let bitmap = window.page_ptr(VirtualPage::new(section.virt)).cast::<Bitmap>();
            // SAFETY: the caller guarantees the section's pages are mapped and
            // unused; the first one becomes the bitmap.
            unsafe { bitmap.write([0; BITMAP_WORDS]) };
            section.bitmap = bitmap;
            section.mark(0, 1, true);
            section.free = section.pages - 1;
            section.hint = 1;
        }
        state.ready = true;
        Ok(())
    }

    fn alloc_page(&self) -> Option<VirtualPage> {
        let mut state = self.state.lock();
        state
            .active()
            .iter_mut()
            .filter(|s| s.free > 0)
            .find_map(|s| s.find_free().map(|i| s.take(i, 1)))
    }

    fn free_page(&self, page: VirtualPage) -> bool {
        self.free_aligned(page, 1)
    }

    fn alloc_aligned(&self, pages: u64) -> Option<VirtualPage> {
        if pages == 0 || pages > 1 << MAX_SECTION_EXPONENT {
            return None;
        }
        let align = pages.next_power_of_two();

        let mut state = self.state.lock();
        state
            .active()
            .iter_mut()
            .filter(|s| s.free >= pages)
            .find_map(|s| s.find_aligned(pages, align).map(|i| s.take(i, pages)))
    }

    fn free_aligned(&self, page: VirtualPage, pages: u64) -> bool {
        let mut state = self.state.lock();
        let Some(section) = state.owner(page) else {
            warn!("free of {page} outside the managed memory");
            return false;
        };

        let index = page.number() - section.virt;
        if pages == 0
            || index == 0
            || index.checked_add(pages).is_none_or(|end| end > section.pages)
            || !section.all_used(index, pages)
        {
            warn!("ignoring free of unallocated pages {page} (+{pages})");
            return false;
        }
        section.release(index, pages);
        true
    }
}
