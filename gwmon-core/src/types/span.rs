//! Byte ranges inside the monitor file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a counter region stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Fixed-size label records describing each counter.
    Labels,
    /// Fixed-width counter value slots.
    Values,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Labels => write!(f, "labels"),
            Self::Values => write!(f, "values"),
        }
    }
}

/// A contiguous byte range `[offset, offset + length)` of the monitor file.
///
/// Offsets and lengths are stored as 4-byte words in the file, so both are `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionSpan {
    offset: u32,
    length: u32,
}

impl RegionSpan {
    /// Create a new span.
    #[must_use]
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// First byte of the span.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Length of the span in bytes.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// One past the last byte of the span.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    /// Check whether two spans share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        (self.offset as u64) < other.end() && (other.offset as u64) < self.end()
    }
}

impl fmt::Display for RegionSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:08x}, 0x{:08x})", self.offset, self.end())
    }
}
