use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalPage;

/// Raw bit layout of a 64-bit x86-64 page-table entry as used by this kernel.
///
/// Only the two low flag bits and the frame number are ever written. Every
/// other bit stays zero: no user/supervisor split, no caching attributes, no
/// global or no-execute bits, and no large pages.
///
/// ### Bit layout
///
/// | Bits   | Name        | Meaning |
/// |--------|-------------|---------|
/// | 0      | `P`         | Entry is valid |
/// | 1      | `RW`        | Writable |
/// | 2–11   | (unused)    | Always zero |
/// | 12–51  | `frame`     | Physical frame number |
/// | 52–63  | (unused)    | Always zero |
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// # use kernel_memory_addresses::PhysicalPage;
/// let e = PageEntryBits::new()
///     .with_present(true)
///     .with_writable(true)
///     .with_frame_number(0x12345);
/// assert_eq!(e.into_bits(), (0x12345 << 12) | 0b11);
/// assert_eq!(e.frame(), PhysicalPage::new(0x12345));
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    #[bits(10)]
    __: u16,

    /// Physical frame number (bits 12..=51).
    #[bits(40)]
    pub frame_number: u64,

    #[bits(12)]
    __: u16,
}

impl PageEntryBits {
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysicalPage {
        PhysicalPage::new(self.frame_number())
    }

    /// Present and writable, pointing at `frame`.
    #[inline]
    #[must_use]
    pub const fn present_rw(frame: PhysicalPage) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_frame_number(frame.number())
    }
}
