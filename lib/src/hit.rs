use std::fmt::{Debug, Display, Formatter};
use std::ops::Range;

use crate::bits::{to_byte, to_padded_byte, BitRange};

/// The portion of a buffer matched by a pattern.
///
/// A failed match attempt is represented by the absence of a hit, that is,
/// matching functions return `Option<Hit>` and `None` means "no match".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hit {
    /// Bit offset where the match starts.
    pub offset: u64,
    /// Length of the match in bits.
    pub length: u64,
}

impl Hit {
    /// Creates a new hit.
    #[inline]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Zero-length hit at `offset`.
    #[inline]
    pub const fn empty_at(offset: u64) -> Self {
        Self { offset, length: 0 }
    }

    /// Bit offset immediately after the end of the match.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Returns `true` if the hit doesn't cover any bit.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The region covered by the hit.
    #[inline]
    pub const fn range(&self) -> BitRange {
        BitRange::new(self.offset, self.end())
    }

    /// Bytes touched by the hit, including partially covered ones.
    pub fn byte_range(&self) -> Range<usize> {
        to_byte(self.offset) as usize..to_padded_byte(self.end()) as usize
    }

    /// Widens this hit so that it covers `other` too.
    pub fn include(&mut self, other: &Hit) -> &mut Self {
        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        self.offset = start;
        self.length = end - start;
        self
    }

    /// Returns this hit moved `delta` bits forward.
    #[inline]
    pub const fn shifted(&self, delta: u64) -> Self {
        Self { offset: self.offset.saturating_add(delta), length: self.length }
    }
}

impl Display for Hit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.offset, self.length)
    }
}

impl Debug for Hit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hit({}+{})", self.offset, self.length)
    }
}
