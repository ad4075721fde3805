//! Address ranges occupied by modules

use serde::Serialize;
use std::fmt;

/// Half-open address range `[start, end)` occupied by a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Range covering `size` bytes from `base`, clamped at the top of the
    /// address space
    #[must_use]
    pub fn from_base_and_size(base: u64, size: u64) -> Self {
        Self { start: base, end: base.saturating_add(size) }
    }

    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if two ranges collide.
    ///
    /// Ranges sharing a base address always collide, even when one of them is
    /// empty, since a module index keeps a single module per base address.
    #[must_use]
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start == other.start || (self.start < other.end && other.start < self.end)
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}-0x{:x}", self.start, self.end)
    }
}
