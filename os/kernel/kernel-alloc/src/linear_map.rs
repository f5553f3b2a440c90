//! # Linear Mapping Pass
//!
//! Gives every frame of the region table its linear alias: frames are
//! visited in region order and mapped to virtual pages `0, 1, 2, …`.
//! Pages the bring-up stage already mapped are left alone.

use kernel_memory_addresses::VirtualPage;
use kernel_mmap::RegionTable;
use kernel_vmem::{AddressSpace, FrameAlloc, MapError, PhysMapper, Platform};
use log::debug;

/// Map every region frame at its linear alias.
///
/// Returns the number of pages that were newly mapped. TLB entries are
/// invalidated on the calling core only.
///
/// # Errors
/// The first [`MapError`] stops the pass; pages mapped before it stay mapped.
pub fn map_linear<M, A, P>(
    space: &mut AddressSpace,
    mapper: &M,
    alloc: &mut A,
    platform: &P,
    regions: &RegionTable,
) -> Result<u64, MapError>
where
    M: PhysMapper,
    A: FrameAlloc + ?Sized,
    P: Platform + ?Sized,
{
    let mut virt = VirtualPage::new(0);
    let mut mapped = 0;

    for region in regions.iter() {
        debug!(
            "linear map: {} pages from {} at {}",
            region.length, region.start, virt
        );
        for frame in region.frames() {
            if !space.is_mapped(mapper, virt) {
                space.map(mapper, alloc, platform, virt, frame)?;
                mapped += 1;
            }
            virt = virt.next();
        }
    }

    Ok(mapped)
}
