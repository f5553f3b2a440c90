//! Host-side machine model: physical memory, an MMU-style window and a
//! platform whose halt is a panic.

use crate::manager::MemoryManager;
use crate::phys_mapper::VirtualWindow;
use crate::sections::BitmapSectionAllocator;
use core::cell::{Cell, RefCell, UnsafeCell};
use kernel_info::boot::{MemoryHandoff, MemoryMapInfo};
use kernel_info::memory::MemoryConfig;
use kernel_info::mmap::MmapRecord;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualPage};
use kernel_mmap::BootMemoryMap;
use kernel_vmem::{PageTableEntry, Platform, TableLevel};
use std::collections::BTreeMap;

#[repr(C, align(4096))]
struct Frame(UnsafeCell<[u8; 4096]>);

impl Frame {
    fn zeroed() -> Box<Self> {
        Box::new(Self(UnsafeCell::new([0; 4096])))
    }
}

/// Sparse physical memory; frames spring into existence zeroed on first
/// touch and never move afterwards.
#[derive(Default)]
pub struct SimMachine {
    frames: RefCell<BTreeMap<u64, Box<Frame>>>,
}

impl SimMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_ptr(&self, frame: PhysicalPage) -> *mut u8 {
        let mut frames = self.frames.borrow_mut();
        let f = frames.entry(frame.number()).or_insert_with(Frame::zeroed);
        f.0.get().cast()
    }

    fn entry(&self, table: PhysicalPage, index: usize) -> PageTableEntry {
        let ptr = self.frame_ptr(table).cast::<u64>();
        PageTableEntry::from_raw(unsafe { ptr.add(index).read() })
    }

    fn set_entry(&self, table: PhysicalPage, index: usize, entry: PageTableEntry) {
        let ptr = self.frame_ptr(table).cast::<u64>();
        unsafe { ptr.add(index).write(entry.raw()) };
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn write(&self, addr: PhysicalAddress, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            let at = addr + i as u64;
            let ptr = self.frame_ptr(at.page());
            unsafe { ptr.add(at.page_offset() as usize).write(*b) };
        }
    }

    /// What the bring-up stage leaves behind: the first 512 pages identity
    /// mapped through tables in frames 1 (PML4) to 4 (PT).
    pub fn bring_up(&self) -> MemoryHandoff {
        let [pml4, pdpt, pd, pt] = [1, 2, 3, 4].map(PhysicalPage::new);
        self.set_entry(pml4, 0, PageTableEntry::table(pdpt));
        self.set_entry(pdpt, 0, PageTableEntry::table(pd));
        self.set_entry(pd, 0, PageTableEntry::table(pt));
        for i in 0..512 {
            self.set_entry(pt, i, PageTableEntry::page(PhysicalPage::new(i as u64)));
        }

        MemoryHandoff {
            mmap: MemoryMapInfo {
                mmap_addr: 0,
                mmap_length: 0,
            },
            page_table_root: pml4.number(),
            last_physical_frame: pt.number(),
            last_virtual_page: 511,
        }
    }
}

/// Reaches virtual pages the way the MMU would: by walking the real tables.
/// Touching an unmapped page panics.
pub struct SimWindow<'m> {
    machine: &'m SimMachine,
    root: PhysicalPage,
}

impl<'m> SimWindow<'m> {
    pub fn new(machine: &'m SimMachine, root: PhysicalPage) -> Self {
        Self { machine, root }
    }
}

impl VirtualWindow for SimWindow<'_> {
    fn page_ptr(&self, page: VirtualPage) -> *mut u8 {
        let mut frame = self.root;
        let mut level = Some(TableLevel::Pml4);
        while let Some(current) = level {
            let entry = self.machine.entry(frame, current.index_of(page).as_usize());
            frame = entry
                .frame()
                .unwrap_or_else(|| panic!("page fault at {page} ({current:?})"));
            level = current.next();
        }
        self.machine.frame_ptr(frame)
    }
}

/// A flat run of pages: linear page `n` is `pages[n]`.
pub struct FlatWindow {
    pages: Vec<Frame>,
}

impl FlatWindow {
    pub fn with_pages(n: usize) -> Self {
        Self {
            pages: (0..n).map(|_| *Frame::zeroed()).collect(),
        }
    }

    pub fn read_u64(&self, page: VirtualPage, index: usize) -> u64 {
        let ptr = self.page_ptr(page).cast::<u64>();
        unsafe { ptr.add(index).read() }
    }
}

impl VirtualWindow for FlatWindow {
    #[allow(clippy::cast_possible_truncation)]
    fn page_ptr(&self, page: VirtualPage) -> *mut u8 {
        let frame = &self.pages[page.number() as usize];
        frame.0.get().cast()
    }
}

/// Counts invalidations; halting is a test failure (or an expected panic).
#[derive(Default)]
pub struct SimPlatform {
    invalidations: Cell<u64>,
}

impl SimPlatform {
    pub fn invalidations(&self) -> u64 {
        self.invalidations.get()
    }
}

impl Platform for SimPlatform {
    fn invalidate_page(&self, _page: VirtualPage) {
        self.invalidations.set(self.invalidations.get() + 1);
    }

    fn halt(&self) -> ! {
        panic!("halted");
    }
}

pub fn boot_map(records: &[(u64, u64, u32)]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|&(base_addr, length, ty)| {
            MmapRecord {
                size: 20,
                base_addr,
                length,
                ty,
            }
            .to_bytes()
        })
        .collect()
}

/// A boot memory map plus configuration.
///
/// The default has low memory plus 7 MiB from 1 MiB (frames `0..0x800`) and
/// 2 MiB at 16 MiB (frames `0x1000..0x1200`), with 256-page sections.
pub struct Scenario {
    pub records: Vec<(u64, u64, u32)>,
    pub config: MemoryConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            records: vec![
                (0, 0x9_F000, 1),
                (0x9_F000, 0x6_1000, 2),
                (0x10_0000, 0x70_0000, 1),
                (0x100_0000, 0x20_0000, 1),
            ],
            config: MemoryConfig { section_exponent: 8 },
        }
    }
}

impl Scenario {
    pub fn boot<'m>(
        &self,
        machine: &'m SimMachine,
    ) -> MemoryManager<BitmapSectionAllocator, SimWindow<'m>, SimPlatform> {
        self.boot_with(machine, &machine.bring_up())
    }

    /// Boot from a handoff prepared by the test, usually a tweaked
    /// [`SimMachine::bring_up`].
    pub fn boot_with<'m>(
        &self,
        machine: &'m SimMachine,
        handoff: &MemoryHandoff,
    ) -> MemoryManager<BitmapSectionAllocator, SimWindow<'m>, SimPlatform> {
        let bytes = boot_map(&self.records);
        let window = SimWindow::new(machine, PhysicalPage::new(handoff.page_table_root));
        unsafe {
            MemoryManager::initialize(
                handoff,
                &BootMemoryMap::from_bytes(&bytes),
                self.config,
                BitmapSectionAllocator::new(),
                window,
                SimPlatform::default(),
            )
        }
    }
}
