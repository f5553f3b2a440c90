//! Single instructions that are not register accesses.

use kernel_memory_addresses::VirtualAddress;

/// Invalidate the TLB entry for the page containing `va`, on this core only.
///
/// # Safety
/// Requires CPL0.
#[inline]
pub unsafe fn invlpg(va: VirtualAddress) {
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) va.as_u64(), options(nostack, preserves_flags));
    }
}

/// Disable interrupts and halt this core forever.
///
/// # Safety
/// Requires CPL0. Never returns; other cores keep running.
#[inline]
pub unsafe fn halt_forever() -> ! {
    loop {
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
    }
}
