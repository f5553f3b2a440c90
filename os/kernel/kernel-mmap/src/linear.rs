//! # Linear Address Translation
//!
//! After boot every frame in the region table has exactly one linear alias:
//! the regions are laid end to end in virtual space starting at page 0.
//!
//! ```text
//! regions:  [ 0 .. 10 )          [ 100 .. 110 )
//! virtual:  [ 0 .. 10 )          [  10 ..  20 )
//! ```
//!
//! Both directions are a linear scan over at most
//! [`MAX_REGIONS`](kernel_info::memory::MAX_REGIONS) entries.

use crate::region::RegionTable;
use kernel_memory_addresses::{PhysicalPage, VirtualPage};

impl RegionTable {
    /// Linear alias of `frame`, or `None` if no region covers it.
    #[must_use]
    pub fn calculate_virtual(&self, frame: PhysicalPage) -> Option<VirtualPage> {
        let mut offset = 0;
        for region in self.iter() {
            // Sorted; nothing further along can match.
            if region.start > frame {
                return None;
            }
            if region.contains(frame) {
                return Some(VirtualPage::new(offset + (frame - region.start)));
            }
            offset += region.length;
        }
        None
    }

    /// Frame behind the linear alias `page`, or `None` if `page` lies beyond
    /// the linear span.
    #[must_use]
    pub fn calculate_physical(&self, page: VirtualPage) -> Option<PhysicalPage> {
        let mut remaining = page.number();
        for region in self.iter() {
            if remaining < region.length {
                return Some(region.start + remaining);
            }
            remaining -= region.length;
        }
        None
    }

    /// The last page of the linear span, if the table is not empty.
    #[must_use]
    pub fn last_linear_page(&self) -> Option<VirtualPage> {
        self.total_pages().checked_sub(1).map(VirtualPage::new)
    }
}
