#[cfg(all(feature = "asm", target_arch = "x86_64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

/// CR3: Page-Map Level-4 Base Register (IA-32e, PCID disabled).
///
/// Holds the frame of the PML4 table and cache-control flags for PML4 walks.
#[bitfield(u64)]
pub struct Cr3 {
    /// Bits 0–2: Reserved (must be 0).
    #[bits(3)]
    __: u8,

    /// Bit 3: PWT: Page-level Write-Through for PML4.
    pub pwt: bool,

    /// Bit 4: PCD: Page-level Cache Disable for PML4.
    pub pcd: bool,

    /// Bits 5–11: Reserved (must be 0 when written).
    #[bits(7)]
    __: u8,

    /// Bits 12–51: PML4 frame number.
    #[bits(40)]
    pml4_frame_number: u64,

    /// Bits 52–63: Reserved.
    #[bits(12)]
    __: u16,
}

impl Cr3 {
    /// A `Cr3` value selecting `pml4` with write-back caching.
    #[must_use]
    pub const fn from_pml4_frame(pml4: PhysicalPage) -> Self {
        Self::new().with_pml4_frame_number(pml4.number())
    }

    /// Frame holding the PML4.
    #[must_use]
    pub const fn pml4_frame(&self) -> PhysicalPage {
        PhysicalPage::new(self.pml4_frame_number())
    }

    /// Full physical address of the PML4 base.
    #[must_use]
    pub const fn pml4_phys(&self) -> PhysicalAddress {
        self.pml4_frame().base()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}
