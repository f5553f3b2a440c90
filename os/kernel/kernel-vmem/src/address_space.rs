//! # Address Space (x86-64, PML4-rooted)
//!
//! The single kernel address space: the PML4 root frame and the highest
//! virtual page mapped so far.
//!
//! ## Highlights
//!
//! - [`AddressSpace::map`] installs one 4 KiB mapping, creating missing
//!   intermediate tables on the way.
//! - [`AddressSpace::is_mapped`] and [`AddressSpace::translate`] walk the
//!   tables without side effects.
//! - [`AddressSpace::search`] finds a virtual page mapping a given frame by
//!   scanning the whole tree.
//!
//! ## Design
//!
//! - Table frames are reached through a [`PhysMapper`]; a frame it cannot
//!   resolve ends the walk.
//! - New tables are zeroed before they are linked into their parent.
//! - The high-water mark only ever grows.

use crate::page_table::{PageTable, PageTableEntry, TableLevel};
use crate::{FrameAlloc, MapError, PhysMapper, Platform};
use kernel_memory_addresses::{PhysicalPage, VirtualPage};
use log::{trace, warn};

/// The kernel's page-table tree.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    root: PhysicalPage,
    last_virtual: VirtualPage,
}

impl AddressSpace {
    /// Adopt an existing tree rooted at `root` whose highest mapped page is
    /// `last_virtual`.
    #[inline]
    #[must_use]
    pub const fn new(root: PhysicalPage, last_virtual: VirtualPage) -> Self {
        Self { root, last_virtual }
    }

    /// Frame of the PML4.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage {
        self.root
    }

    /// Highest virtual page mapped so far.
    #[inline]
    #[must_use]
    pub const fn last_virtual(&self) -> VirtualPage {
        self.last_virtual
    }

    #[inline]
    unsafe fn table<'a, M: PhysMapper>(
        mapper: &M,
        frame: PhysicalPage,
    ) -> Result<&'a mut PageTable, MapError> {
        unsafe { mapper.table_mut(frame) }.ok_or(MapError::UnresolvedTable(frame))
    }

    /// Frame mapped at `page`, if every level of the walk is present.
    #[must_use]
    pub fn translate<M: PhysMapper>(&self, mapper: &M, page: VirtualPage) -> Option<PhysicalPage> {
        let mut frame = self.root;
        let mut level = TableLevel::Pml4;
        loop {
            // SAFETY: every frame on the walk holds a page table.
            let table = unsafe { mapper.table_mut(frame) }?;
            frame = table.get(level.index_of(page)).frame()?;
            match level.next() {
                Some(next) => level = next,
                None => return Some(frame),
            }
        }
    }

    /// Whether `page` has a present leaf entry.
    ///
    /// Pages above the high-water mark are never considered mapped.
    #[must_use]
    pub fn is_mapped<M: PhysMapper>(&self, mapper: &M, page: VirtualPage) -> bool {
        page <= self.last_virtual && self.translate(mapper, page).is_some()
    }

    /// Map `page` to `frame`.
    ///
    /// Missing intermediate tables are taken from `alloc`, zeroed and linked
    /// with `PRESENT | WRITABLE`. The leaf translation is then invalidated on
    /// the calling core only, and the high-water mark raised if `page` is
    /// beyond it. Mapping the same pair twice is harmless.
    ///
    /// # Errors
    /// - [`MapError::OutOfFrames`] if a needed table cannot be allocated.
    /// - [`MapError::UnresolvedTable`] if a table frame cannot be reached.
    ///
    /// On error no leaf entry is written and the high-water mark is unchanged.
    pub fn map<M, A, P>(
        &mut self,
        mapper: &M,
        alloc: &mut A,
        platform: &P,
        page: VirtualPage,
        frame: PhysicalPage,
    ) -> Result<(), MapError>
    where
        M: PhysMapper,
        A: FrameAlloc + ?Sized,
        P: Platform + ?Sized,
    {
        let mut table_frame = self.root;
        let mut level = TableLevel::Pml4;

        while let Some(lower) = level.next() {
            // SAFETY: `table_frame` is the root or was linked as a table.
            let table = unsafe { Self::table(mapper, table_frame) }?;
            let index = level.index_of(page);

            table_frame = if let Some(next) = table.get(index).frame() {
                next
            } else {
                let fresh = alloc.alloc_4k().ok_or(MapError::OutOfFrames)?;
                // SAFETY: a freshly allocated frame is owned by nobody else.
                let child = unsafe { Self::table(mapper, fresh) }?;
                child.zero();
                table.set(index, PageTableEntry::table(fresh));
                trace!("new {lower:?} table in {fresh} for {page}");
                fresh
            };
            level = lower;
        }

        // SAFETY: linked as the leaf table above.
        let leaf = unsafe { Self::table(mapper, table_frame) }?;
        leaf.set(TableLevel::Pt.index_of(page), PageTableEntry::page(frame));
        platform.invalidate_page(page);

        if page > self.last_virtual {
            self.last_virtual = page;
        }
        Ok(())
    }

    /// Find a virtual page whose leaf entry maps `frame`.
    ///
    /// Depth-first over the whole tree, each table scanned from index 511
    /// down to 0; the first match wins. Subtables that cannot be reached are
    /// skipped. Worst case visits every table.
    #[must_use]
    pub fn search<M: PhysMapper>(&self, mapper: &M, frame: PhysicalPage) -> Option<VirtualPage> {
        Self::search_table(mapper, self.root, TableLevel::Pml4, 0, frame)
    }

    fn search_table<M: PhysMapper>(
        mapper: &M,
        table_frame: PhysicalPage,
        level: TableLevel,
        prefix: u64,
        target: PhysicalPage,
    ) -> Option<VirtualPage> {
        // SAFETY: `table_frame` is the root or linked from a parent table.
        let Some(table) = (unsafe { mapper.table_mut(table_frame) }) else {
            warn!("skipping unreachable {level:?} table in {table_frame}");
            return None;
        };

        for (index, child) in table.present_descending() {
            let prefix = prefix | (index.as_u64() << level.shift());
            match level.next() {
                None if child == target => return Some(VirtualPage::new(prefix)),
                None => {}
                Some(lower) => {
                    if let Some(found) = Self::search_table(mapper, child, lower, prefix, target) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}
