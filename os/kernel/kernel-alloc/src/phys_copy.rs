//! # Copying From Physical Memory
//!
//! Reads arbitrary physical memory, such as firmware tables, into a kernel
//! buffer. Each covered frame is reached through an existing mapping when
//! there is one; otherwise it is mapped right above the virtual high-water
//! mark and stays mapped.
//!
//! ```text
//! source:  |.....[xxxx|xxxxxxxxxx|xxxxxxxxxx|xxx]......|
//!                 first   middle     middle   last
//! ```

use crate::bridge::SectionAllocator;
use crate::fatal::fatal;
use crate::manager::MemoryManager;
use crate::phys_mapper::VirtualWindow;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress, PhysicalPage, VirtualPage};
use kernel_vmem::Platform;
use log::trace;

const PAGE_BYTES: usize = 1 << PAGE_SHIFT;

impl<S, W, P> MemoryManager<S, W, P>
where
    S: SectionAllocator,
    W: VirtualWindow,
    P: Platform,
{
    /// Fill `dest` with the bytes starting at physical address `source`.
    ///
    /// Failing to map a frame is fatal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn copy_physical(&mut self, dest: &mut [u8], source: PhysicalAddress) {
        let mut frame = source.page();
        let mut offset = source.page_offset() as usize;
        let mut copied = 0;

        while copied < dest.len() {
            let page = self.reach(frame);
            let chunk = (PAGE_BYTES - offset).min(dest.len() - copied);
            let src = self.window.page_ptr(page);
            // SAFETY: `page` maps `frame` and `offset + chunk` stays inside it.
            unsafe {
                core::ptr::copy_nonoverlapping(src.add(offset), dest[copied..].as_mut_ptr(), chunk);
            }

            copied += chunk;
            offset = 0;
            frame = frame.next();
        }
    }

    /// A virtual page mapping `frame`, mapping one if needed.
    fn reach(&mut self, frame: PhysicalPage) -> VirtualPage {
        if let Some(page) = self.lookup_virtual(frame) {
            return page;
        }

        let page = self.last_virtual().next();
        if let Err(e) = self.map(page, frame) {
            fatal(
                &self.platform,
                format_args!("cannot map {frame} at {page} for copying: {e}"),
            );
        }
        trace!("mapped {frame} at {page} for copying");
        page
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Scenario, SimMachine};
    use kernel_memory_addresses::{PhysicalAddress, VirtualPage};

    #[allow(clippy::cast_possible_truncation)]
    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    fn check(machine: &SimMachine, addr: u64, len: usize) {
        let mut mm = Scenario::default().boot(machine);
        let reference = pattern(len, 7);
        machine.write(PhysicalAddress::new(addr), &reference);

        let mut buf = vec![0u8; len];
        mm.copy_physical(&mut buf, PhysicalAddress::new(addr));
        assert_eq!(buf, reference);
    }

    #[test]
    fn shorter_than_a_page() {
        check(&SimMachine::new(), 0x0105_0123, 100);
    }

    #[test]
    fn exactly_one_page() {
        check(&SimMachine::new(), 0x0106_0000, 4096);
    }

    #[test]
    fn unaligned_multi_page_span() {
        check(&SimMachine::new(), 0x0107_0F00, 3 * 4096 + 0x234);
    }

    #[test]
    fn span_ending_on_a_page_boundary() {
        check(&SimMachine::new(), 0x0108_0800, 0x1800);
    }

    #[test]
    fn empty_copy_touches_nothing() {
        let machine = SimMachine::new();
        let mut mm = Scenario::default().boot(&machine);
        let before = mm.last_virtual();
        mm.copy_physical(&mut [], PhysicalAddress::new(0x0900_0000));
        assert_eq!(mm.last_virtual(), before);
    }

    #[test]
    fn frames_without_alias_are_mapped_on_demand() {
        let machine = SimMachine::new();
        let mut mm = Scenario::default().boot(&machine);
        let end = mm.last_virtual();

        // Frames 0x900..=0x902 lie between the two regions.
        let addr = PhysicalAddress::new(0x0090_0800);
        let reference = pattern(0x2000, 3);
        machine.write(addr, &reference);

        let mut buf = vec![0u8; reference.len()];
        mm.copy_physical(&mut buf, addr);
        assert_eq!(buf, reference);
        assert_eq!(mm.last_virtual(), end + 3);
        assert_eq!(mm.lookup_virtual(addr.page()), Some(end + 1));

        // A second copy reuses the mappings.
        let mut again = vec![0u8; reference.len()];
        mm.copy_physical(&mut again, addr);
        assert_eq!(again, reference);
        assert_eq!(mm.last_virtual(), end + 3);
    }

    #[test]
    fn copy_across_the_end_of_a_region() {
        let machine = SimMachine::new();
        let mut mm = Scenario::default().boot(&machine);

        // Frame 0x7FF ends region 0, frame 0x800 has no alias.
        let addr = PhysicalAddress::new(0x007F_F800);
        let reference = pattern(0x1000, 11);
        machine.write(addr, &reference);

        let mut buf = vec![0u8; reference.len()];
        mm.copy_physical(&mut buf, addr);
        assert_eq!(buf, reference);
        assert_eq!(mm.last_virtual(), VirtualPage::new(0xA00));
    }

    #[test]
    #[should_panic(expected = "halted")]
    fn mapping_failure_is_fatal() {
        let machine = SimMachine::new();
        let mut mm = Scenario::default().boot(&machine);
        while mm.alloc_page().is_some() {}

        // Needs a fresh leaf table, but no frames are left.
        let mut buf = [0u8; 16];
        mm.copy_physical(&mut buf, PhysicalAddress::new(0x0090_0000));
    }
}
