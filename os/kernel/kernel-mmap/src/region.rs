//! # Physical Region Table
//!
//! A fixed-capacity, sorted table of available physical memory runs. The
//! table order is what defines the kernel's linear virtual mapping: virtual
//! page 0 is the first page of the first region, and each following region
//! continues where the previous one ended.
//!
//! ## Invariants
//!
//! * Regions are sorted ascending by `start`.
//! * No two regions overlap. Overlapping inserts are coalesced; merely
//!   adjacent regions stay separate.
//! * At most [`MAX_REGIONS`] entries, each with a non-zero length.

use core::mem::{offset_of, size_of};
use kernel_info::memory::MAX_REGIONS;
use kernel_memory_addresses::PhysicalPage;

/// A maximal contiguous run of available physical pages.
///
/// The layout is fixed (`start` at offset 0, `length` at offset 8) so that a
/// [`RegionTableView`] can describe it to code that only sees bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PhysicalRegion {
    /// First frame of the run.
    pub start: PhysicalPage,
    /// Number of pages in the run.
    pub length: u64,
}

impl PhysicalRegion {
    #[inline]
    #[must_use]
    pub const fn new(start: PhysicalPage, length: u64) -> Self {
        Self { start, length }
    }

    /// One past the last frame of the run.
    #[inline]
    #[must_use]
    pub fn end(&self) -> PhysicalPage {
        self.start + self.length
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, frame: PhysicalPage) -> bool {
        self.start <= frame && frame < self.end()
    }

    #[inline]
    fn overlaps(&self, start: PhysicalPage, end: PhysicalPage) -> bool {
        self.start < end && start < self.end()
    }

    /// Iterate every frame of the run in ascending order.
    pub fn frames(&self) -> impl Iterator<Item = PhysicalPage> + use<> {
        let start = self.start;
        (0..self.length).map(move |i| start + i)
    }
}

/// Sorted, non-overlapping table of [`PhysicalRegion`]s.
#[derive(Clone)]
pub struct RegionTable {
    regions: [PhysicalRegion; MAX_REGIONS],
    count: usize,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RegionTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl RegionTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [PhysicalRegion {
                start: PhysicalPage::new(0),
                length: 0,
            }; MAX_REGIONS],
            count: 0,
        }
    }

    /// Build a table directly from a list of regions, in any order.
    ///
    /// Entries beyond the capacity and empty entries are ignored.
    #[must_use]
    pub fn from_regions(regions: &[PhysicalRegion]) -> Self {
        let mut table = Self::new();
        for r in regions {
            table.insert(r.start, r.length);
        }
        table
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.count == MAX_REGIONS
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[PhysicalRegion] {
        &self.regions[..self.count]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, PhysicalRegion> {
        self.as_slice().iter()
    }

    /// The last region, i.e. the one with the highest frames.
    #[must_use]
    pub fn last(&self) -> Option<&PhysicalRegion> {
        self.as_slice().last()
    }

    /// Number of frames covered by the table; also the length of the linear
    /// virtual span.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        self.iter().map(|r| r.length).sum()
    }

    /// The region containing `frame`, together with its index.
    #[must_use]
    pub fn find(&self, frame: PhysicalPage) -> Option<(usize, &PhysicalRegion)> {
        self.iter()
            .enumerate()
            .take_while(|(_, r)| r.start <= frame)
            .find(|(_, r)| r.contains(frame))
    }

    /// Insert a run of `length` frames starting at `start`.
    ///
    /// Existing regions overlapping the new run are absorbed into it. The
    /// result is placed by linear scan and shift, keeping the table sorted.
    /// Returns `false` if the run is empty or the table is full.
    pub fn insert(&mut self, start: PhysicalPage, length: u64) -> bool {
        if length == 0 {
            return false;
        }

        let mut new_start = start;
        let mut new_end = start + length;

        // Absorb overlapping regions, compacting the table in place.
        let mut kept = 0;
        for i in 0..self.count {
            let r = self.regions[i];
            if r.overlaps(new_start, new_end) {
                new_start = new_start.min(r.start);
                new_end = new_end.max(r.end());
            } else {
                self.regions[kept] = r;
                kept += 1;
            }
        }
        self.count = kept;

        if self.is_full() {
            return false;
        }

        let at = self
            .as_slice()
            .iter()
            .position(|r| r.start > new_start)
            .unwrap_or(self.count);

        self.regions.copy_within(at..self.count, at + 1);
        self.regions[at] = PhysicalRegion::new(new_start, new_end - new_start);
        self.count += 1;
        true
    }

    /// A byte-level description of the table for generic consumers.
    #[must_use]
    pub fn view(&self) -> RegionTableView<'_> {
        let entries = self.as_slice();
        // SAFETY: `PhysicalRegion` is `repr(C)` over two `u64`s with no padding,
        // so every byte of the initialized prefix is initialized.
        let bytes = unsafe {
            core::slice::from_raw_parts(
                entries.as_ptr().cast::<u8>(),
                core::mem::size_of_val(entries),
            )
        };

        RegionTableView {
            bytes,
            entry_size: size_of::<PhysicalRegion>(),
            start_offset: offset_of!(PhysicalRegion, start),
            length_offset: offset_of!(PhysicalRegion, length),
            count: entries.len(),
        }
    }
}

/// Layout-agnostic view of a region table.
///
/// Describes the table as raw bytes plus the entry stride and the offsets of
/// the `start` and `length` fields, so the section allocator can read it
/// without depending on [`PhysicalRegion`] itself. Both fields are native
/// endian `u64` page counts.
#[derive(Debug, Copy, Clone)]
pub struct RegionTableView<'a> {
    bytes: &'a [u8],
    entry_size: usize,
    start_offset: usize,
    length_offset: usize,
    count: usize,
}

impl<'a> RegionTableView<'a> {
    /// Describe an arbitrary table. Returns `None` if the described entries
    /// do not fit into `bytes`.
    #[must_use]
    pub fn new(
        bytes: &'a [u8],
        entry_size: usize,
        start_offset: usize,
        length_offset: usize,
        count: usize,
    ) -> Option<Self> {
        let field_end = start_offset.max(length_offset).checked_add(8)?;
        if field_end > entry_size || entry_size.checked_mul(count)? > bytes.len() {
            return None;
        }

        Some(Self {
            bytes,
            entry_size,
            start_offset,
            length_offset,
            count,
        })
    }

    #[must_use]
    pub const fn entry_size(&self) -> usize {
        self.entry_size
    }

    #[must_use]
    pub const fn start_offset(&self) -> usize {
        self.start_offset
    }

    #[must_use]
    pub const fn length_offset(&self) -> usize {
        self.length_offset
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn read(&self, at: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[at..at + 8]);
        u64::from_ne_bytes(raw)
    }

    /// The `index`th entry as a `(start frame, page count)` pair.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<(PhysicalPage, u64)> {
        if index >= self.count {
            return None;
        }
        let base = index * self.entry_size;
        Some((
            PhysicalPage::new(self.read(base + self.start_offset)),
            self.read(base + self.length_offset),
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = (PhysicalPage, u64)> + '_ {
        (0..self.count).filter_map(|i| self.get(i))
    }
}
