//! # Boot Memory-Map Records
//!
//! The boot environment describes physical memory as a packed stream of
//! variable-stride records:
//!
//! ```text
//! offset  size  field
//!      0     4  size       (bytes following this field)
//!      4     8  base_addr
//!     12     8  length     (bytes)
//!     20     4  type       (1 = available RAM)
//! ```
//!
//! The next record starts `size + 4` bytes after the current one. Parsing is
//! done on a byte slice with little-endian reads, so the stream needs no
//! particular alignment.

/// Record type of usable RAM.
pub const MMAP_AVAILABLE: u32 = 1;

/// Minimum byte length of one record including its `size` field.
pub const MMAP_RECORD_LEN: usize = 24;

/// One decoded memory-map record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MmapRecord {
    pub size: u32,
    pub base_addr: u64,
    pub length: u64,
    pub ty: u32,
}

impl MmapRecord {
    #[inline]
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.ty == MMAP_AVAILABLE
    }

    /// Exclusive end address, saturating at `u64::MAX`.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base_addr.saturating_add(self.length)
    }

    /// Encode the fixed fields into the packed wire format.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MMAP_RECORD_LEN] {
        let mut out = [0u8; MMAP_RECORD_LEN];
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4..12].copy_from_slice(&self.base_addr.to_le_bytes());
        out[12..20].copy_from_slice(&self.length.to_le_bytes());
        out[20..24].copy_from_slice(&self.ty.to_le_bytes());
        out
    }
}

/// Iterator over a packed record stream.
///
/// Stops at the end of the slice, at a truncated trailing record, or at a
/// record whose `size` is too small to hold the fixed fields.
#[derive(Debug, Clone)]
pub struct MmapRecords<'a> {
    bytes: &'a [u8],
}

impl<'a> MmapRecords<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

impl Iterator for MmapRecords<'_> {
    type Item = MmapRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.len() < MMAP_RECORD_LEN {
            return None;
        }

        let size = read_u32(self.bytes, 0);
        let stride = size as usize + 4;
        if stride < MMAP_RECORD_LEN {
            self.bytes = &[];
            return None;
        }

        let record = MmapRecord {
            size,
            base_addr: read_u64(self.bytes, 4),
            length: read_u64(self.bytes, 12),
            ty: read_u32(self.bytes, 20),
        };

        self.bytes = self.bytes.get(stride..).unwrap_or(&[]);
        Some(record)
    }
}
