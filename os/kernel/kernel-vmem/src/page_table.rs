//! # Page Tables
//!
//! One 4 KiB table type serves all four levels. The level only decides which
//! 9-bit slice of the virtual page number indexes the table and whether an
//! entry points to another table or to a mapped frame.

use crate::PageEntryBits;
use kernel_memory_addresses::{PhysicalPage, VirtualPage};

/// Number of entries per table.
pub const ENTRIES: usize = 512;

/// The four paging levels, top to bottom.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TableLevel {
    /// Page Map Level 4, the root referenced by CR3.
    Pml4,
    /// Page Directory Pointer Table.
    Pdpt,
    /// Page Directory.
    Pd,
    /// Page Table; its entries map frames.
    Pt,
}

impl TableLevel {
    /// Bit position of this level's 9-bit slice within a virtual page number.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Pml4 => 27,
            Self::Pdpt => 18,
            Self::Pd => 9,
            Self::Pt => 0,
        }
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, page: VirtualPage) -> TableIndex {
        TableIndex(((page.number() >> self.shift()) & 0x1FF) as u16)
    }

    /// The level below, or `None` for the leaf level.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pml4 => Some(Self::Pdpt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pd => Some(Self::Pt),
            Self::Pt => None,
        }
    }
}

/// Index into a [`PageTable`], always `< 512`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct TableIndex(u16);

impl TableIndex {
    /// Create an index; `None` if out of range.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        if (v as usize) < ENTRIES {
            Some(Self(v))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// All indices from 511 down to 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn descending() -> impl Iterator<Item = Self> {
        (0..ENTRIES as u16).rev().map(Self)
    }
}

/// One entry of a [`PageTable`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageTableEntry(PageEntryBits);

impl PageTableEntry {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// Link to a next-level table in `frame`.
    #[inline]
    #[must_use]
    pub const fn table(frame: PhysicalPage) -> Self {
        Self(PageEntryBits::present_rw(frame))
    }

    /// Leaf mapping of `frame`.
    #[inline]
    #[must_use]
    pub const fn page(frame: PhysicalPage) -> Self {
        Self(PageEntryBits::present_rw(frame))
    }

    /// The referenced frame, if the entry is present.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalPage> {
        if self.0.present() {
            Some(self.0.frame())
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(v: u64) -> Self {
        Self(PageEntryBits::from_bits(v))
    }
}

/// A 4 KiB-aligned array of 512 entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES],
}

impl PageTable {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::zero(); ENTRIES],
        }
    }

    /// Clear all entries.
    #[inline]
    pub fn zero(&mut self) {
        self.entries = [PageTableEntry::zero(); ENTRIES];
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PageTableEntry {
        self.entries[i.as_usize()]
    }

    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PageTableEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// Present entries from the highest index to the lowest.
    pub fn present_descending(&self) -> impl Iterator<Item = (TableIndex, PhysicalPage)> + '_ {
        TableIndex::descending().filter_map(|i| self.get(i).frame().map(|f| (i, f)))
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_nine_bit_slices() {
        let page = VirtualPage::new((3 << 27) | (7 << 18) | (511 << 9) | 42);
        assert_eq!(TableLevel::Pml4.index_of(page).as_usize(), 3);
        assert_eq!(TableLevel::Pdpt.index_of(page).as_usize(), 7);
        assert_eq!(TableLevel::Pd.index_of(page).as_usize(), 511);
        assert_eq!(TableLevel::Pt.index_of(page).as_usize(), 42);
    }

    #[test]
    fn levels_descend_to_leaf() {
        let mut level = TableLevel::Pml4;
        let mut depth = 1;
        while let Some(next) = level.next() {
            level = next;
            depth += 1;
        }
        assert_eq!(level, TableLevel::Pt);
        assert_eq!(depth, 4);
    }

    #[test]
    fn entry_encoding_uses_only_present_and_writable() {
        let e = PageTableEntry::page(PhysicalPage::new(0xABCDE));
        assert_eq!(e.raw(), (0xABCDE << 12) | 0b11);
        assert_eq!(e.frame(), Some(PhysicalPage::new(0xABCDE)));
        assert_eq!(PageTableEntry::zero().frame(), None);
        assert_eq!(PageTableEntry::from_raw(e.raw()), e);
    }

    #[test]
    fn present_entries_iterate_high_to_low() {
        let mut t = PageTable::new();
        t.set(TableIndex::new(5).unwrap(), PageTableEntry::table(PhysicalPage::new(50)));
        t.set(TableIndex::new(400).unwrap(), PageTableEntry::table(PhysicalPage::new(40)));
        let seen: Vec<_> = t
            .present_descending()
            .map(|(i, f)| (i.as_usize(), f.number()))
            .collect();
        assert_eq!(seen, [(400, 40), (5, 50)]);
        assert!(TableIndex::new(512).is_none());
    }

    #[test]
    fn table_is_one_page() {
        assert_eq!(core::mem::size_of::<PageTable>(), 4096);
        assert_eq!(core::mem::align_of::<PageTable>(), 4096);
    }
}
