//! # Memory Initialization Handoff

/// Everything the memory core needs from the bring-up stage.
///
/// Filled once before paging initialization runs. All values are page
/// numbers or plain byte addresses; the structure stays `#[repr(C)]` so the
/// bring-up assembly can populate it directly.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct MemoryHandoff {
    /// Location of the boot memory map.
    pub mmap: MemoryMapInfo,

    /// Frame number of the top-level (PML4) page table currently loaded.
    pub page_table_root: u64,

    /// Last physical frame consumed by the bring-up stage. The bootstrap
    /// allocator continues right after it.
    pub last_physical_frame: u64,

    /// Highest virtual page already mapped by the bring-up stage.
    pub last_virtual_page: u64,
}

#[repr(C)]
#[derive(Debug, Clone)]
pub struct MemoryMapInfo {
    /// Physical (identity-mapped) address of the first memory-map record.
    pub mmap_addr: u64,

    /// Total length of the record stream in **bytes**.
    pub mmap_length: u64,
}
