//! Host-side stand-ins for physical memory and the platform.

use crate::{FrameAlloc, PageTable, PhysMapper, Platform};
use core::cell::{RefCell, UnsafeCell};
use kernel_memory_addresses::{PhysicalPage, VirtualPage};

/// A trivial **bump** allocator: always hands out the next frame number.
pub struct BumpAlloc {
    next: u64,
    end: u64,
}

impl BumpAlloc {
    pub fn new(start: u64, end: u64) -> Self {
        Self { next: start, end }
    }

    pub fn next(&self) -> u64 {
        self.next
    }
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        if self.next >= self.end {
            return None;
        }
        let p = self.next;
        self.next += 1;
        Some(PhysicalPage::new(p))
    }
}

/// Simulated physical memory: frame `n` is `frames[n]`.
pub struct TestPhys {
    frames: Vec<UnsafeCell<PageTable>>,
}

impl TestPhys {
    pub fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n).map(|_| UnsafeCell::new(PageTable::new())).collect(),
        }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn table_mut<'a>(&self, frame: PhysicalPage) -> Option<&'a mut PageTable> {
        let cell = self.frames.get(usize::try_from(frame.number()).ok()?)?;
        // SAFETY: tests never hold two references to the same frame.
        Some(unsafe { &mut *cell.get() })
    }
}

/// Records every invalidation; halting is a test failure.
#[derive(Default)]
pub struct RecordingPlatform {
    invalidated: RefCell<Vec<VirtualPage>>,
}

impl RecordingPlatform {
    pub fn invalidated(&self) -> Vec<VirtualPage> {
        self.invalidated.borrow().clone()
    }
}

impl Platform for RecordingPlatform {
    fn invalidate_page(&self, page: VirtualPage) {
        self.invalidated.borrow_mut().push(page);
    }

    fn halt(&self) -> ! {
        panic!("halted");
    }
}
