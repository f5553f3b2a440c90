//! The kernel-wide memory manager.
//!
//! Built once by [`init_memory`] on the bootstrap core, then shared by all
//! cores behind a [`SpinLock`]. The lock serializes page-table changes; page
//! allocation itself would not need it.

use crate::platform::X86Platform;
use kernel_alloc::{BitmapSectionAllocator, DirectWindow, MemoryManager, fatal};
use kernel_info::boot::MemoryHandoff;
use kernel_info::memory::MemoryConfig;
use kernel_memory_addresses::PhysicalPage;
use kernel_mmap::BootMemoryMap;
use kernel_qemu::QemuLogger;
use kernel_registers::LoadRegisterUnsafe;
use kernel_registers::cr3::Cr3;
use kernel_sync::{SpinLock, SpinLockGuard, SyncOnceCell};
use log::{LevelFilter, info, warn};

pub type KernelMemory = MemoryManager<BitmapSectionAllocator, DirectWindow, X86Platform>;

static MEMORY: SyncOnceCell<SpinLock<KernelMemory>> = SyncOnceCell::new();

/// Bring up kernel memory. Call once, on the bootstrap core, before any other
/// core touches memory. Any failure halts the core.
///
/// # Safety
/// - Must run at CPL0 with the bring-up page tables active.
/// - `handoff` must describe the live tables and a boot memory map in the
///   identity-mapped low memory.
pub unsafe fn init_memory(handoff: &MemoryHandoff, config: MemoryConfig) {
    if QemuLogger::install(LevelFilter::Debug).is_err() {
        warn!("another logger is already installed");
    }

    let platform = X86Platform;
    // SAFETY: the bring-up stage placed the map in identity-mapped low memory.
    let boot_map = unsafe { BootMemoryMap::from_info(&handoff.mmap) }
        .unwrap_or_else(|e| fatal(&platform, e));

    // SAFETY: CPL0.
    let cr3 = unsafe { Cr3::load_unsafe() };
    if !root_matches(handoff, cr3) {
        fatal(
            &platform,
            format_args!(
                "handoff root {} is not the active root {}",
                PhysicalPage::new(handoff.page_table_root),
                cr3.pml4_frame()
            ),
        );
    }

    // SAFETY: the handoff was checked against CR3 and the caller vouches
    // for the rest.
    let manager = unsafe {
        KernelMemory::initialize(
            handoff,
            &boot_map,
            config,
            BitmapSectionAllocator::new(),
            DirectWindow,
            platform,
        )
    };

    if MEMORY.set(SpinLock::new(manager)).is_err() {
        warn!("memory was already initialized, keeping the first manager");
        return;
    }
    info!("kernel memory ready");
}

/// Whether the handoff describes the page tables the CPU is using.
#[must_use]
pub const fn root_matches(handoff: &MemoryHandoff, cr3: Cr3) -> bool {
    cr3.pml4_frame().number() == handoff.page_table_root
}

#[must_use]
pub fn is_initialized() -> bool {
    MEMORY.is_initialized()
}

/// Exclusive access to the memory manager. Halts if memory is not up yet.
pub fn memory() -> SpinLockGuard<'static, KernelMemory> {
    MEMORY
        .get()
        .unwrap_or_else(|| fatal(&X86Platform, "memory used before init_memory"))
        .lock()
}
