//! # Physical and Virtual Page Numbers
//!
//! Strongly typed wrappers for raw memory addresses and 4 KiB page numbers used
//! by the kernel's paging and frame allocation code.
//!
//! ## Overview
//!
//! The memory core reasons almost exclusively in **page numbers** (address
//! `>> 12`), not in byte addresses. Mixing a physical frame number with a
//! virtual page number is the classic bug in this kind of code, so each kind
//! gets its own zero-cost newtype:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address on the memory bus. |
//! | [`VirtualAddress`] | A byte address as seen through the page tables. |
//! | [`PhysicalPage`] | A physical frame number (`PhysicalAddress >> 12`). |
//! | [`VirtualPage`] | A virtual page number (`VirtualAddress >> 12`). |
//!
//! Only 4 KiB pages exist in this kernel; there are no huge pages.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2042);
//! let frame = pa.page();
//! assert_eq!(frame.number(), 0x102);
//! assert_eq!(pa.page_offset(), 0x42);
//! assert_eq!(frame.join(pa.page_offset()), pa);
//!
//! let vp = VirtualPage::new(7);
//! assert_eq!(vp.base().as_u64(), 7 * PAGE_SIZE);
//! assert_eq!(vp.next(), VirtualPage::new(8));
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - Page-number arithmetic (`+ u64`, distance between pages) is explicit and
//!   never converts between the physical and virtual domains. Translating
//!   between them is the job of the region table and the page tables.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use crate::physical_address::PhysicalAddress;
pub use crate::physical_page::PhysicalPage;
pub use crate::virtual_address::VirtualAddress;
pub use crate::virtual_page::VirtualPage;

/// log2 of the page size; the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

/// Size of a page in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Mask selecting the in-page offset of an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_split_and_join() {
        let pa = PhysicalAddress::new(0x1234_5678_9ABC);
        let frame = pa.page();
        assert_eq!(frame.number(), 0x1234_5678_9);
        assert_eq!(pa.page_offset(), 0xABC);
        assert_eq!(frame.base().as_u64(), 0x1234_5678_9000);
        assert_eq!(frame.join(pa.page_offset()), pa);
    }

    #[test]
    fn virtual_split_and_join() {
        let va = VirtualAddress::new(0x0000_7FFF_0000_1FFF);
        let page = va.page();
        assert_eq!(page.base().as_u64(), 0x0000_7FFF_0000_1000);
        assert_eq!(va.page_offset(), 0xFFF);
        assert_eq!(page.join(va.page_offset()), va);
    }

    #[test]
    fn page_arithmetic_stays_in_domain() {
        let a = PhysicalPage::new(10);
        let b = a + 5;
        assert_eq!(b.number(), 15);
        assert_eq!(b - a, 5);
        assert!(a < b);

        let v = VirtualPage::new(u64::MAX >> PAGE_SHIFT);
        assert_eq!(v.checked_add(1), None);
        assert_eq!(VirtualPage::new(3).checked_add(2), Some(VirtualPage::new(5)));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(format!("{}", PhysicalPage::new(0x1F)), "PFN 0x1F");
        assert_eq!(format!("{}", VirtualPage::new(0x2A)), "VPN 0x2A");
        assert_eq!(
            format!("{}", PhysicalAddress::new(0x1000)),
            "0x0000000000001000"
        );
    }
}
