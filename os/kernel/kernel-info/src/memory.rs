//! # Memory Layout

/// Byte address below which memory belongs to the bring-up identity map.
pub const LOW_MEMORY_LIMIT: u64 = 0x0010_0000; // 1 MiB

/// [`LOW_MEMORY_LIMIT`] expressed in pages.
pub const LOW_MEMORY_PAGES: u64 = LOW_MEMORY_LIMIT >> 12;

/// Capacity of the physical region table.
pub const MAX_REGIONS: usize = 255;

/// Default log2 of the pages per allocator section (2^15 pages = 128 MiB).
pub const DEFAULT_SECTION_EXPONENT: u32 = 15;

/// Upper bound on the number of allocator sections.
///
/// With the default exponent this covers 64 GiB of free memory; more halts
/// initialization with a section error. Descriptors are stored inline in the
/// memory manager, about 48 bytes each.
pub const MAX_SECTIONS: usize = 512;

/// Run-time tunables for memory initialization.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryConfig {
    /// log2 of the maximum number of pages one allocator section spans.
    pub section_exponent: u32,
}

impl MemoryConfig {
    /// Pages spanned by one full section.
    #[inline]
    #[must_use]
    pub const fn section_pages(&self) -> u64 {
        1 << self.section_exponent
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            section_exponent: DEFAULT_SECTION_EXPONENT,
        }
    }
}

const _: () = {
    assert!(LOW_MEMORY_LIMIT.is_multiple_of(4096));
    assert!(LOW_MEMORY_PAGES == 0x100);
    assert!(DEFAULT_SECTION_EXPONENT < 40);
};
