/*! Skip tables for fast scanning.

A [`SkipTable`] marks the byte values that can never be the first byte of a
match. While searching for a pattern, every byte-aligned candidate offset
whose byte is marked is discarded without running the matcher on it.

Skip tables are derived from [`Starts`], the set of bytes the instances of a
pattern can begin with, which is computed bottom-up from the pattern tree.
The computation is conservative: a table may skip less than it could, but
never skips a byte where a match could begin.
*/

use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;

use bitvec::array::BitArray;

/// A set of byte values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteSet(BitArray<[u64; 4]>);

impl ByteSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set that contains every byte.
    pub fn all() -> Self {
        Self(BitArray::new([u64::MAX; 4]))
    }

    /// Creates a set with the bytes in `range`.
    pub fn from_range(range: RangeInclusive<u8>) -> Self {
        let mut set = Self::new();
        set.insert_range(range);
        set
    }

    /// Adds a byte to the set.
    #[inline]
    pub fn insert(&mut self, byte: u8) {
        self.0.set(byte as usize, true);
    }

    /// Adds every byte in `range` to the set.
    pub fn insert_range(&mut self, range: RangeInclusive<u8>) {
        let range = *range.start() as usize..=*range.end() as usize;
        self.0[range].fill(true);
    }

    /// Returns `true` if `byte` is in the set.
    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.0[byte as usize]
    }

    /// Adds all the bytes in `other` to this set.
    pub fn union(&mut self, other: &ByteSet) {
        for (a, b) in self.0.data.iter_mut().zip(other.0.data) {
            *a |= b;
        }
    }

    /// Returns the bytes that are not in this set.
    pub fn complement(&self) -> ByteSet {
        let mut data = self.0.data;
        data.iter_mut().for_each(|word| *word = !*word);
        Self(BitArray::new(data))
    }

    /// Number of bytes in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.not_any()
    }

    /// Returns `true` if the set contains the 256 byte values.
    pub fn is_full(&self) -> bool {
        self.0.all()
    }

    /// Iterator over the bytes in the set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter_ones().map(|b| b as u8)
    }
}

impl Debug for ByteSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|b| format!("{:02x}", b)))
            .finish()
    }
}

/// The bytes that the instances of some pattern can start with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Starts {
    /// Possible values for the first byte of an instance. When an instance
    /// is shorter than a byte every byte that begins with those bits is
    /// included.
    pub bytes: ByteSet,
    /// `true` if the pattern has zero-length instances, in which case the
    /// pattern doesn't constrain the first byte at all.
    pub nullable: bool,
}

impl Starts {
    /// Starts of a pattern that only produces zero-length instances.
    pub fn nullable() -> Self {
        Self { bytes: ByteSet::new(), nullable: true }
    }

    /// Starts of a pattern that accepts any first byte.
    pub fn any() -> Self {
        Self { bytes: ByteSet::all(), nullable: false }
    }

    /// Starts of a pattern whose instances begin with the `len` most
    /// significant bits of `prefix`. `len` is clamped to 8.
    pub fn with_prefix(prefix: u8, len: u32) -> Self {
        let len = len.min(8);
        if len == 0 {
            return Self::nullable();
        }
        let free = 8 - len;
        let low = (prefix >> free) << free;
        let high = low | ((1u16 << free) - 1) as u8;
        Self { bytes: ByteSet::from_range(low..=high), nullable: false }
    }

    /// Merges the starts of an alternative.
    pub fn union(&mut self, other: &Starts) {
        self.bytes.union(&other.bytes);
        self.nullable |= other.nullable;
    }
}

/// Set of byte values that can't begin a match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SkipTable(ByteSet);

impl SkipTable {
    /// A table that doesn't skip any byte.
    pub fn none() -> Self {
        Self(ByteSet::new())
    }

    /// Builds the table for a pattern with the given starts.
    pub fn from_starts(starts: &Starts) -> Self {
        if starts.nullable {
            Self::none()
        } else {
            Self(starts.bytes.complement())
        }
    }

    /// Returns `true` if a match can't start with `byte`.
    #[inline]
    pub fn can_skip(&self, byte: u8) -> bool {
        self.0.contains(byte)
    }

    /// Returns `true` if the table doesn't skip anything.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of byte values skipped by the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the table skips no byte at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the index of the first byte in `data[from..]` that can't be
    /// skipped, or `data.len()` if all of them can.
    pub fn next_candidate(&self, data: &[u8], from: usize) -> usize {
        if self.is_trivial() || from >= data.len() {
            return from.min(data.len());
        }
        data[from..]
            .iter()
            .position(|b| !self.can_skip(*b))
            .map_or(data.len(), |pos| from + pos)
    }
}

impl Debug for SkipTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SkipTable({} skipped)", self.len())
    }
}
