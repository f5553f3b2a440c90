//! # Memory Manager
//!
//! The one context object for kernel memory. It owns the region table, the
//! kernel address space and the frame allocator bridge, plus the window and
//! platform they act through.
//!
//! ## Lifecycle
//!
//! ```text
//! MemoryHandoff ─► region table ─► linear pass (bootstrap frames)
//!                                          │
//!                                          ▼
//!                        section allocator configured + initialized
//!                                          │
//!                                          ▼
//!                       steady state: map / lookup / alloc / copy
//! ```
//!
//! Initialization either succeeds or halts the core. There is no teardown.
//!
//! ## Concurrency
//!
//! Page allocation (`alloc_page`, `alloc_dma`, …) takes `&self` and is safe
//! from any core. Everything that touches page tables or the virtual
//! high-water mark takes `&mut self`; the kernel keeps the manager behind a
//! lock for that. TLB invalidation only affects the calling core.

use crate::bootstrap::BootstrapFrameAlloc;
use crate::bridge::{FrameBridge, SectionAllocator};
use crate::fatal::fatal;
use crate::linear_map::map_linear;
use crate::phys_mapper::{LinearMapper, VirtualWindow};
use kernel_info::boot::MemoryHandoff;
use kernel_info::memory::MemoryConfig;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualPage};
use kernel_mmap::{BootMemoryMap, RegionTable};
use kernel_vmem::{AddressSpace, MapError, Platform};
use log::{info, warn};

pub struct MemoryManager<S, W, P> {
    pub(crate) regions: RegionTable,
    pub(crate) space: AddressSpace,
    pub(crate) bridge: FrameBridge<S>,
    pub(crate) window: W,
    pub(crate) platform: P,
}

impl<S, W, P> MemoryManager<S, W, P>
where
    S: SectionAllocator,
    W: VirtualWindow,
    P: Platform,
{
    /// Bring kernel memory from the bring-up state to the steady state.
    ///
    /// 1. Build the region table from `boot_map`.
    /// 2. Map every region frame at its linear alias, taking page-table
    ///    frames from the bootstrap allocator.
    /// 3. Hand everything after the bootstrap watermark to `sections`.
    ///
    /// Any failure is fatal.
    ///
    /// # Safety
    /// - `handoff` must describe the live page tables: the root frame, the
    ///   last frame the bring-up stage consumed and the highest mapped page.
    /// - The bring-up mapping must cover the linear alias of every frame up
    ///   to the bootstrap watermark plus the tables the linear pass creates.
    /// - `window` must reach every mapped linear page.
    pub unsafe fn initialize(
        handoff: &MemoryHandoff,
        boot_map: &BootMemoryMap<'_>,
        config: MemoryConfig,
        mut sections: S,
        window: W,
        platform: P,
    ) -> Self {
        let regions =
            RegionTable::from_boot_map(boot_map).unwrap_or_else(|e| fatal(&platform, e));

        let mut space = AddressSpace::new(
            PhysicalPage::new(handoff.page_table_root),
            VirtualPage::new(handoff.last_virtual_page),
        );

        let mut bootstrap =
            BootstrapFrameAlloc::new(&regions, PhysicalPage::new(handoff.last_physical_frame));
        let mapper = LinearMapper::new(&regions, &window);
        let mapped = map_linear(&mut space, &mapper, &mut bootstrap, &platform, &regions)
            .unwrap_or_else(|e| fatal(&platform, format_args!("linear mapping failed: {e}")));

        info!(
            "last pages: virtual={}, physical={}",
            space.last_virtual(),
            bootstrap.watermark()
        );
        info!("linear map complete, {mapped} pages newly mapped");

        let first_free = first_free_page(&regions, &bootstrap);

        if let Err(e) = sections.configure(regions.view(), config.section_exponent, first_free) {
            fatal(&platform, format_args!("section allocator: {e}"));
        }
        // SAFETY: the linear pass mapped every page from `first_free` on and
        // the bootstrap allocator, which is dropped here, never reaches them.
        if let Err(e) = unsafe { sections.init_structures(&window) } {
            fatal(&platform, format_args!("section allocator: {e}"));
        }

        Self {
            regions,
            space,
            bridge: FrameBridge::new(sections),
            window,
            platform,
        }
    }

    #[inline]
    #[must_use]
    pub const fn regions(&self) -> &RegionTable {
        &self.regions
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    #[must_use]
    pub const fn sections(&self) -> &S {
        self.bridge.sections()
    }

    /// Frame of the PML4.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage {
        self.space.root()
    }

    /// Linear alias of `frame`.
    #[inline]
    #[must_use]
    pub fn calculate_virtual(&self, frame: PhysicalPage) -> Option<VirtualPage> {
        self.regions.calculate_virtual(frame)
    }

    /// Frame behind the linear alias `page`.
    #[inline]
    #[must_use]
    pub fn calculate_physical(&self, page: VirtualPage) -> Option<PhysicalPage> {
        self.regions.calculate_physical(page)
    }

    /// Highest virtual page mapped so far.
    #[inline]
    #[must_use]
    pub const fn last_virtual(&self) -> VirtualPage {
        self.space.last_virtual()
    }

    #[must_use]
    pub fn is_mapped(&self, page: VirtualPage) -> bool {
        let mapper = LinearMapper::new(&self.regions, &self.window);
        self.space.is_mapped(&mapper, page)
    }

    /// Frame mapped at `page`, if any.
    #[must_use]
    pub fn translate(&self, page: VirtualPage) -> Option<PhysicalPage> {
        let mapper = LinearMapper::new(&self.regions, &self.window);
        self.space.translate(&mapper, page)
    }

    /// Map `page` to `frame`, growing page tables from the bridge.
    ///
    /// The old translation is only invalidated on the calling core.
    ///
    /// # Errors
    /// See [`AddressSpace::map`].
    pub fn map(&mut self, page: VirtualPage, frame: PhysicalPage) -> Result<(), MapError> {
        let mapper = LinearMapper::new(&self.regions, &self.window);
        let mut frames = self.bridge.frames(&self.regions);
        self.space
            .map(&mapper, &mut frames, &self.platform, page, frame)
    }

    /// A virtual page mapping `frame`: its linear alias if it has one,
    /// otherwise the first match of a full page-table search.
    #[must_use]
    pub fn lookup_virtual(&self, frame: PhysicalPage) -> Option<VirtualPage> {
        if let Some(page) = self.regions.calculate_virtual(frame) {
            return Some(page);
        }
        let mapper = LinearMapper::new(&self.regions, &self.window);
        self.space.search(&mapper, frame)
    }

    /// Allocate one page of the linear map.
    #[inline]
    #[must_use]
    pub fn alloc_page(&self) -> Option<VirtualPage> {
        self.bridge.alloc_page()
    }

    #[inline]
    pub fn free_page(&self, page: VirtualPage) {
        self.bridge.free_page(page);
    }

    /// Allocate `pages` physically contiguous pages for a device. The
    /// physical start is aligned to `pages.next_power_of_two()` pages.
    #[must_use]
    pub fn alloc_dma(&self, pages: u64) -> Option<PhysicalAddress> {
        let page = self.bridge.alloc_aligned(pages)?;
        if let Some(frame) = self.regions.calculate_physical(page) {
            return Some(frame.base());
        }
        self.bridge.free_aligned(page, pages);
        None
    }

    /// Return a run obtained from [`alloc_dma`](Self::alloc_dma).
    pub fn free_dma(&self, addr: PhysicalAddress, pages: u64) {
        if let Some(page) = self.regions.calculate_virtual(addr.page()) {
            self.bridge.free_aligned(page, pages);
        } else {
            warn!("ignoring free of DMA memory at {addr} outside the regions");
        }
    }

    /// Pages currently allocated through the bridge.
    #[inline]
    #[must_use]
    pub fn used_pages(&self) -> u64 {
        self.bridge.used_pages()
    }
}

/// Linear alias of the frame the bootstrap allocator would hand out next.
/// With nothing left it is the end of the linear span, which leaves the
/// section allocator an empty range.
fn first_free_page(regions: &RegionTable, bootstrap: &BootstrapFrameAlloc<'_>) -> VirtualPage {
    bootstrap
        .peek()
        .and_then(|frame| regions.calculate_virtual(frame))
        .unwrap_or(VirtualPage::new(regions.total_pages()))
}
