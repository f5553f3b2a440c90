use core::fmt::Display;
use kernel_vmem::Platform;
use log::error;

/// Log `reason` and stop the calling core for good.
///
/// Used for conditions the memory core cannot continue from: an unreachable
/// boot map, no usable memory, a failed linear pass, a failed allocator
/// setup, or a mapping failure while copying physical memory.
#[cold]
pub fn fatal<P: Platform + ?Sized>(platform: &P, reason: impl Display) -> ! {
    error!("fatal memory error: {reason}");
    platform.halt()
}
