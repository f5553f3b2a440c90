//! # Boot Memory Map
//!
//! Turns the boot environment's memory map into a [`RegionTable`].
//!
//! Only available (`type == 1`) records are used. Memory below
//! [`LOW_MEMORY_LIMIT`] is owned by the bring-up stage: records that end at or
//! below it are skipped, and a record reaching into it is folded into a region
//! starting at page 0. Record bases are rounded up to the next page and the
//! trailing partial page is dropped.

use crate::RegionError;
use crate::region::{PhysicalRegion, RegionTable};
use kernel_info::boot::MemoryMapInfo;
use kernel_info::memory::{LOW_MEMORY_LIMIT, LOW_MEMORY_PAGES};
use kernel_info::mmap::{MmapRecord, MmapRecords};
use kernel_memory_addresses::{PAGE_OFFSET_MASK, PAGE_SHIFT, PAGE_SIZE, PhysicalPage};
use log::{debug, info};

/// The raw record stream handed over by the bring-up stage.
#[derive(Debug, Copy, Clone)]
pub struct BootMemoryMap<'a> {
    bytes: &'a [u8],
}

impl<'a> BootMemoryMap<'a> {
    /// Wrap an already accessible record stream.
    #[must_use]
    pub const fn from_bytes(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Access the record stream described by `info`.
    ///
    /// Before paging is fully set up only low memory is known to be
    /// reachable, so a map at or above [`LOW_MEMORY_LIMIT`] is rejected.
    ///
    /// # Errors
    /// [`RegionError::BootMapOutOfReach`] if the map lies outside low memory
    /// (or at address zero with a non-zero length).
    ///
    /// # Safety
    /// `info` must describe `mmap_length` readable bytes at the identity
    /// mapped address `mmap_addr`, valid for `'a`.
    pub unsafe fn from_info(info: &MemoryMapInfo) -> Result<Self, RegionError> {
        let out_of_reach = RegionError::BootMapOutOfReach {
            addr: info.mmap_addr,
        };
        if info.mmap_addr >= LOW_MEMORY_LIMIT {
            return Err(out_of_reach);
        }
        if info.mmap_length == 0 {
            return Ok(Self::from_bytes(&[]));
        }
        if info.mmap_addr == 0 {
            return Err(out_of_reach);
        }

        let len = usize::try_from(info.mmap_length).map_err(|_| out_of_reach)?;
        // SAFETY: the caller guarantees the range is mapped and readable.
        let bytes = unsafe { core::slice::from_raw_parts(info.mmap_addr as *const u8, len) };
        Ok(Self::from_bytes(bytes))
    }

    pub fn records(&self) -> MmapRecords<'a> {
        MmapRecords::new(self.bytes)
    }
}

/// Clip one available record to the whole pages it contributes.
///
/// Returns `None` for records that end inside low memory or that are too
/// short to hold a single page once their base is aligned.
#[must_use]
pub fn clip_record(record: &MmapRecord) -> Option<PhysicalRegion> {
    if record.end() <= LOW_MEMORY_LIMIT {
        return None;
    }

    let mut base = record.base_addr;
    let mut length = record.length;

    let misalign = base & PAGE_OFFSET_MASK;
    if misalign != 0 {
        let shard = PAGE_SIZE - misalign;
        if length <= shard {
            return None;
        }
        base += shard;
        length -= shard;
    }

    let mut start = base >> PAGE_SHIFT;
    let mut pages = length >> PAGE_SHIFT;

    // Everything below the threshold joins the region at page zero.
    if start <= LOW_MEMORY_PAGES {
        pages += start;
        start = 0;
    }

    if pages == 0 {
        return None;
    }
    Some(PhysicalRegion::new(PhysicalPage::new(start), pages))
}

impl RegionTable {
    /// Build the region table from the boot memory map.
    ///
    /// Records are consumed until the stream ends or the table is full.
    ///
    /// # Errors
    /// [`RegionError::NoUsableMemory`] if no region survives filtering.
    pub fn from_boot_map(map: &BootMemoryMap<'_>) -> Result<Self, RegionError> {
        let mut table = Self::new();

        for record in map.records() {
            if !record.is_available() {
                continue;
            }

            let Some(region) = clip_record(&record) else {
                debug!(
                    "skipping mmap record base=0x{:X} len=0x{:X}",
                    record.base_addr, record.length
                );
                continue;
            };

            debug!(
                "region: start={} pages=0x{:X}",
                region.start, region.length
            );
            table.insert(region.start, region.length);

            if table.is_full() {
                debug!("region table full, ignoring remaining records");
                break;
            }
        }

        if table.is_empty() {
            return Err(RegionError::NoUsableMemory);
        }

        info!(
            "found {} memory regions, {} pages",
            table.len(),
            table.total_pages()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::mmap::MMAP_AVAILABLE;

    fn stream(records: &[(u64, u64, u32)]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|&(base_addr, length, ty)| {
                MmapRecord {
                    size: 20,
                    base_addr,
                    length,
                    ty,
                }
                .to_bytes()
            })
            .collect()
    }

    fn record(base_addr: u64, length: u64) -> MmapRecord {
        MmapRecord {
            size: 20,
            base_addr,
            length,
            ty: MMAP_AVAILABLE,
        }
    }

    fn regions(table: &RegionTable) -> Vec<(u64, u64)> {
        table.iter().map(|r| (r.start.number(), r.length)).collect()
    }

    #[test]
    fn low_memory_records_are_skipped() {
        assert_eq!(clip_record(&record(0, 0x9_F000)), None);
        assert_eq!(clip_record(&record(0xF_0000, 0x1_0000)), None);
    }

    #[test]
    fn straddling_record_folds_into_page_zero() {
        let r = clip_record(&record(0x8_0000, 0x10_0000)).unwrap();
        assert_eq!((r.start.number(), r.length), (0, 0x180));

        // Starting exactly at the threshold still folds.
        let r = clip_record(&record(0x10_0000, 0x70_0000)).unwrap();
        assert_eq!((r.start.number(), r.length), (0, 0x800));
    }

    #[test]
    fn misaligned_base_is_rounded_up() {
        let r = clip_record(&record(0x20_0800, 0x2800)).unwrap();
        assert_eq!((r.start.number(), r.length), (0x201, 2));

        // Nothing beyond the shard.
        assert_eq!(clip_record(&record(0x20_0800, 0x800)), None);
        // Less than one whole page left after the shard.
        assert_eq!(clip_record(&record(0x20_0800, 0xFFF)), None);
    }

    #[test]
    fn builds_sorted_table_from_unsorted_map() {
        let bytes = stream(&[
            (0x0, 0x9_FC00, 1),
            (0x100_0000, 0x20_0000, 1),
            (0xF_0000, 0x1_0000, 2),
            (0x10_0000, 0x70_0000, 1),
            (0xFEC0_0000, 0x1000, 2),
        ]);
        let table = RegionTable::from_boot_map(&BootMemoryMap::from_bytes(&bytes)).unwrap();
        assert_eq!(regions(&table), [(0, 0x800), (0x1000, 0x200)]);
    }

    #[test]
    fn stops_at_capacity() {
        let records: Vec<_> = (0..300u64)
            .map(|i| (0x100_0000 + i * 0x2000, 0x1000, 1))
            .collect();
        let bytes = stream(&records);
        let table = RegionTable::from_boot_map(&BootMemoryMap::from_bytes(&bytes)).unwrap();
        assert!(table.is_full());
        assert_eq!(table.last().unwrap().start.number(), 0x1000 + 254 * 2);
    }

    #[test]
    fn no_usable_memory_is_an_error() {
        let bytes = stream(&[(0x0, 0x9_FC00, 1), (0x10_0000, 0x100_0000, 2)]);
        let err = RegionTable::from_boot_map(&BootMemoryMap::from_bytes(&bytes)).unwrap_err();
        assert_eq!(err, RegionError::NoUsableMemory);
    }

    #[test]
    fn map_above_low_memory_is_out_of_reach() {
        let info = MemoryMapInfo {
            mmap_addr: LOW_MEMORY_LIMIT,
            mmap_length: 24,
        };
        let err = unsafe { BootMemoryMap::from_info(&info) }.unwrap_err();
        assert_eq!(
            err,
            RegionError::BootMapOutOfReach {
                addr: LOW_MEMORY_LIMIT
            }
        );
    }

    #[test]
    fn null_map_with_records_is_out_of_reach() {
        let info = MemoryMapInfo {
            mmap_addr: 0,
            mmap_length: 24,
        };
        let err = unsafe { BootMemoryMap::from_info(&info) }.unwrap_err();
        assert_eq!(err, RegionError::BootMapOutOfReach { addr: 0 });
    }

    #[test]
    fn empty_map_needs_no_access() {
        let info = MemoryMapInfo {
            mmap_addr: 0x9000,
            mmap_length: 0,
        };
        let map = unsafe { BootMemoryMap::from_info(&info) }.unwrap();
        assert_eq!(map.records().count(), 0);
    }
}
