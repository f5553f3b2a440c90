use kernel_memory_addresses::VirtualPage;
use kernel_registers::cpu::{halt_forever, invlpg};
use kernel_vmem::Platform;

/// The real processor: `invlpg` and `cli; hlt`.
///
/// Invalidation is local to the executing core. No shootdown IPIs are sent.
#[derive(Debug, Default, Copy, Clone)]
pub struct X86Platform;

impl Platform for X86Platform {
    #[inline]
    fn invalidate_page(&self, page: VirtualPage) {
        // SAFETY: the kernel runs at CPL0.
        unsafe { invlpg(page.base()) }
    }

    fn halt(&self) -> ! {
        // SAFETY: the kernel runs at CPL0.
        unsafe { halt_forever() }
    }
}
