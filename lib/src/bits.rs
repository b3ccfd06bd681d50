/*! Bit-addressed offsets and ranges.

Every offset handled by this crate is a bit offset, byte boundaries are just
the offsets that are multiples of 8. Match windows and hits are expressed as
half-open ranges of bit offsets, while sample ranges (the lengths that the
instances of a pattern can have) use both ends inclusively.
*/

use std::fmt::{Debug, Display, Formatter};

/// Sentinel that represents an unbounded offset or length.
pub const INF: u64 = u64::MAX;

/// Number of bits in a byte.
pub const BYTE: u64 = 8;

/// Converts a number of bytes into a number of bits.
#[inline]
pub const fn to_bit(bytes: u64) -> u64 {
    bytes.saturating_mul(BYTE)
}

/// Returns the index of the byte that contains the given bit.
#[inline]
pub const fn to_byte(bit: u64) -> u64 {
    bit / BYTE
}

/// Returns the number of bytes needed for holding `bits` bits.
#[inline]
pub const fn to_padded_byte(bits: u64) -> u64 {
    bits / BYTE + (bits % BYTE != 0) as u64
}

/// Returns `true` if `bit` is at a byte boundary.
#[inline]
pub const fn is_byte_aligned(bit: u64) -> bool {
    bit % BYTE == 0
}

/// A range of bit offsets or bit lengths.
///
/// When used as a region, `low` is included and `high` is excluded. When
/// used as a sample range, both bounds are lengths and are inclusive. An
/// *undefined* range (`low > high`) is a distinct sentinel used for patterns
/// that can't produce any instance, it is not the same thing as an empty
/// range like `[0, 0)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    /// Lower bound.
    pub low: u64,
    /// Upper bound.
    pub high: u64,
}

impl BitRange {
    /// Creates a new range.
    #[inline]
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Range that covers every possible offset.
    #[inline]
    pub const fn full() -> Self {
        Self { low: 0, high: INF }
    }

    /// Empty range located at `at`.
    #[inline]
    pub const fn empty_at(at: u64) -> Self {
        Self { low: at, high: at }
    }

    /// The undefined sentinel.
    #[inline]
    pub const fn undefined() -> Self {
        Self { low: INF, high: 0 }
    }

    /// Degenerate sample range for fixed-size patterns.
    #[inline]
    pub const fn fixed(len: u64) -> Self {
        Self { low: len, high: len }
    }

    /// Returns `true` unless this is the undefined sentinel.
    #[inline]
    pub const fn is_defined(&self) -> bool {
        self.low <= self.high
    }

    /// Returns `true` if the region doesn't contain any offset.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.low >= self.high
    }

    /// Returns `true` if both bounds are equal.
    #[inline]
    pub const fn is_degenerate(&self) -> bool {
        self.low == self.high
    }

    /// Returns `true` if the upper bound is [`INF`].
    #[inline]
    pub const fn is_unbounded(&self) -> bool {
        self.high == INF
    }

    /// Number of bits in the region, zero for an undefined range.
    #[inline]
    pub const fn len(&self) -> u64 {
        self.high.saturating_sub(self.low)
    }

    /// Returns `true` if `bit` lies within the half-open region.
    #[inline]
    pub const fn contains(&self, bit: u64) -> bool {
        self.low <= bit && bit < self.high
    }

    /// Returns `true` if `len` lies within the inclusive sample range.
    #[inline]
    pub const fn admits(&self, len: u64) -> bool {
        self.low <= len && len <= self.high
    }

    /// Returns `true` if both inclusive sample ranges share a length.
    pub fn overlaps(&self, other: &BitRange) -> bool {
        self.is_defined()
            && other.is_defined()
            && self.low <= other.high
            && other.low <= self.high
    }

    /// Widens this range so that it also covers `other`. Including an
    /// undefined range is a no-op, and including into an undefined range
    /// copies `other`.
    pub fn include(&mut self, other: &BitRange) -> &mut Self {
        if !other.is_defined() {
            return self;
        }
        if !self.is_defined() {
            *self = *other;
            return self;
        }
        self.low = self.low.min(other.low);
        self.high = self.high.max(other.high);
        self
    }

    /// Returns this region with its upper bound clipped to `limit`.
    pub fn clip(&self, limit: u64) -> Self {
        let high = self.high.min(limit);
        Self { low: self.low.min(high), high }
    }

    /// Adds two sample ranges, the result is the range of lengths of the
    /// concatenation of an instance from each one.
    pub fn concat(&self, other: &BitRange) -> Self {
        if !self.is_defined() || !other.is_defined() {
            return Self::undefined();
        }
        Self {
            low: self.low.saturating_add(other.low),
            high: self.high.saturating_add(other.high),
        }
    }
}

impl Default for BitRange {
    fn default() -> Self {
        Self::full()
    }
}

impl Display for BitRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.is_defined() {
            return write!(f, "[undefined]");
        }
        match self.high {
            INF => write!(f, "[{}, inf)", self.low),
            high => write!(f, "[{}, {})", self.low, high),
        }
    }
}

impl Debug for BitRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
