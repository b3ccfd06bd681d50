use std::fmt::{Debug, Display, Formatter};
use std::slice;

use bitmask::bitmask;
use bitvec::prelude::*;
use bstr::BStr;
use smallvec::SmallVec;

use crate::bits::{to_bit, BYTE};
use crate::patterns::PatternId;
use crate::skips::Starts;

bitmask! {
    /// Flags that relax how the bytes of a literal are compared.
    ///
    /// Flags are only allowed in literals made of whole bytes.
    #[derive(Debug, Hash)]
    pub mask LiteralFlagSet: u8 where flags LiteralFlags {
        Nocase          = 0x01,
        DashUnderscore  = 0x02,
    }
}

/// Sub-patterns of a multi-pattern (alternation or sequence).
pub type Subs = SmallVec<[PatternId; 4]>;

/// An exact string of bits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    bits: BitVec<u8, Msb0>,
    flags: LiteralFlagSet,
}

impl Literal {
    /// Creates a literal with the given bytes.
    pub fn new(bytes: &[u8]) -> Self {
        Self { bits: BitVec::from_slice(bytes), flags: LiteralFlagSet::none() }
    }

    /// Creates a literal from a bit string.
    pub fn from_bits(bits: &BitSlice<u8, Msb0>) -> Self {
        Self { bits: bits.to_bitvec(), flags: LiteralFlagSet::none() }
    }

    /// Creates a literal with the `len` least significant bits of `value`,
    /// most significant bit first.
    pub fn from_value(value: u64, len: usize) -> Self {
        let len = len.min(64);
        let mut bits = BitVec::<u8, Msb0>::repeat(false, len);
        if len > 0 {
            bits.store_be(value);
        }
        Self { bits, flags: LiteralFlagSet::none() }
    }

    /// Returns this literal with `flag` set.
    pub fn with_flag(mut self, flag: LiteralFlags) -> Self {
        self.flags.set(flag);
        self
    }

    /// The literal's bits.
    #[inline]
    pub fn bits(&self) -> &BitSlice<u8, Msb0> {
        self.bits.as_bitslice()
    }

    /// The literal's flags.
    #[inline]
    pub fn flags(&self) -> &LiteralFlagSet {
        &self.flags
    }

    /// Length of the literal in bits.
    #[inline]
    pub fn len(&self) -> u64 {
        self.bits.len() as u64
    }

    /// Returns `true` if the literal has no bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Returns the literal's bytes if its length is a multiple of 8.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        (self.bits.len() % 8 == 0).then(|| self.bits.as_raw_slice())
    }

    /// Returns `true` if no flag is set.
    #[inline]
    pub fn is_plain(&self) -> bool {
        self.flags.is_none()
    }

    /// Returns the concatenation of two literals with the same flags.
    pub(crate) fn concat(&self, other: &Literal) -> Literal {
        let mut bits = self.bits.clone();
        bits.extend_from_bitslice(&other.bits);
        Literal { bits, flags: self.flags.clone() }
    }

    /// Compares a byte of the literal with a byte of the data, honoring the
    /// literal's flags.
    #[inline]
    fn byte_eq(&self, expected: u8, actual: u8) -> bool {
        if expected == actual {
            return true;
        }
        if self.flags.contains(LiteralFlags::Nocase)
            && expected.eq_ignore_ascii_case(&actual)
        {
            return true;
        }
        self.flags.contains(LiteralFlags::DashUnderscore)
            && is_dash_or_underscore(expected)
            && is_dash_or_underscore(actual)
    }

    /// Returns `true` if the literal appears in `data` at bit offset `at`,
    /// without going past `limit`.
    pub(crate) fn matches_at(
        &self,
        data: &BitSlice<u8, Msb0>,
        at: u64,
        limit: u64,
    ) -> bool {
        let end = match at.checked_add(self.len()) {
            Some(end) if end <= limit && end <= data.len() as u64 => end,
            _ => return false,
        };

        let window = &data[at as usize..end as usize];

        if self.is_plain() {
            return window == self.bits.as_bitslice();
        }

        window
            .chunks_exact(8)
            .zip(self.bits.as_raw_slice())
            .all(|(actual, expected)| {
                self.byte_eq(*expected, actual.load_be::<u8>())
            })
    }

    /// Bytes that can start an instance of this literal.
    pub(crate) fn starts(&self) -> Starts {
        if self.bits.len() < 8 {
            let len = self.bits.len();
            let prefix = self.bits.load_be::<u8>() << (8 - len);
            return Starts::with_prefix(prefix, len as u32);
        }
        let first = self.bits[..8].load_be::<u8>();
        let mut starts = Starts::with_prefix(first, 8);
        if self.flags.contains(LiteralFlags::Nocase) {
            starts.bytes.insert(first.to_ascii_lowercase());
            starts.bytes.insert(first.to_ascii_uppercase());
        }
        if self.flags.contains(LiteralFlags::DashUnderscore)
            && is_dash_or_underscore(first)
        {
            starts.bytes.insert(b'-');
            starts.bytes.insert(b'_');
        }
        starts
    }

    /// Bytes equivalent to `byte` under the literal's flags, `byte` itself
    /// comes first.
    pub(crate) fn variants(&self, byte: u8) -> SmallVec<[u8; 2]> {
        let mut variants = SmallVec::new();
        variants.push(byte);
        if self.flags.contains(LiteralFlags::Nocase)
            && byte.is_ascii_alphabetic()
        {
            variants.push(if byte.is_ascii_lowercase() {
                byte.to_ascii_uppercase()
            } else {
                byte.to_ascii_lowercase()
            });
        }
        if self.flags.contains(LiteralFlags::DashUnderscore)
            && is_dash_or_underscore(byte)
        {
            variants.push(if byte == b'-' { b'_' } else { b'-' });
        }
        variants
    }
}

#[inline]
fn is_dash_or_underscore(b: u8) -> bool {
    b == b'-' || b == b'_'
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.as_bytes() {
            Some(bytes) => write!(f, "{:?}", BStr::new(bytes))?,
            None => {
                write!(f, "0b")?;
                for bit in self.bits.iter() {
                    write!(f, "{}", if *bit { '1' } else { '0' })?;
                }
            }
        }
        if self.flags.contains(LiteralFlags::Nocase) {
            write!(f, " nocase")?;
        }
        if self.flags.contains(LiteralFlags::DashUnderscore) {
            write!(f, " dash-underscore")?;
        }
        Ok(())
    }
}

impl Debug for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Literal({})", self)
    }
}

/// Bounds for the number of times a repetition applies its sub-pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Repeat {
    /// Minimum number of repetitions.
    pub min: u64,
    /// Maximum number of repetitions, `None` means unbounded.
    pub max: Option<u64>,
}

impl Repeat {
    /// Exactly `n` repetitions.
    pub const fn exactly(n: u64) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// At least `n` repetitions.
    pub const fn at_least(n: u64) -> Self {
        Self { min: n, max: None }
    }

    /// Between `min` and `max` repetitions, both included.
    pub const fn between(min: u64, max: u64) -> Self {
        Self { min, max: Some(max) }
    }

    /// Zero or one repetition.
    pub const fn optional() -> Self {
        Self::between(0, 1)
    }

    /// Returns `true` if the number of repetitions is fixed.
    pub fn is_fixed(&self) -> bool {
        self.max == Some(self.min)
    }

    /// Returns `true` if `count` repetitions are allowed.
    pub fn allows(&self, count: u64) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Returns `true` if every count allowed by `other` is allowed by this.
    pub fn covers(&self, other: &Repeat) -> bool {
        self.min <= other.min
            && match (self.max, other.max) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(a), Some(b)) => b <= a,
            }
    }
}

impl Display for Repeat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{{{}}}", max),
            Some(max) => write!(f, "{{{},{}}}", self.min, max),
            None => write!(f, "{{{},}}", self.min),
        }
    }
}

/// Zero-width assertions about the position of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Beginning of the buffer.
    Bob,
    /// End of the buffer.
    Eob,
    /// Beginning of a line.
    Bol,
    /// End of a line.
    Eol,
    /// Beginning of a word.
    Bow,
    /// End of a word.
    Eow,
}

impl Anchor {
    /// Returns `true` if the assertion holds at bit offset `at` of `data`.
    /// Except for [`Anchor::Bob`] and [`Anchor::Eob`], assertions can only
    /// hold at byte boundaries.
    pub(crate) fn holds(&self, data: &[u8], at: u64) -> bool {
        let end = to_bit(data.len() as u64);
        match self {
            Anchor::Bob => at == 0,
            Anchor::Eob => at == end,
            _ if at % BYTE != 0 || at > end => false,
            Anchor::Bol => at == 0 || prev_byte(data, at) == Some(b'\n'),
            Anchor::Eol => at == end || next_byte(data, at) == Some(b'\n'),
            Anchor::Bow => {
                next_byte(data, at).is_some_and(is_word_byte)
                    && !prev_byte(data, at).is_some_and(is_word_byte)
            }
            Anchor::Eow => {
                prev_byte(data, at).is_some_and(is_word_byte)
                    && !next_byte(data, at).is_some_and(is_word_byte)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Anchor::Bob => "bob",
            Anchor::Eob => "eob",
            Anchor::Bol => "bol",
            Anchor::Eol => "eol",
            Anchor::Bow => "bow",
            Anchor::Eow => "eow",
        }
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[inline]
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[inline]
fn prev_byte(data: &[u8], at: u64) -> Option<u8> {
    let idx = (at / BYTE) as usize;
    idx.checked_sub(1).and_then(|i| data.get(i).copied())
}

#[inline]
fn next_byte(data: &[u8], at: u64) -> Option<u8> {
    data.get((at / BYTE) as usize).copied()
}

/// The domain a pattern applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// Any domain.
    Any,
    /// Host names.
    HostName,
    /// Disk or volume labels.
    DiskLabel,
    /// Full file paths.
    FilePath,
    /// File names, without the directory part.
    FileName,
    /// Directory names.
    DirName,
    /// File contents.
    FileContents,
    /// File name and file contents.
    NameAndContents,
    /// File name or file contents.
    NameOrContents,
    /// Network protocol payloads.
    NetworkProtocol,
}

impl Domain {
    /// Returns `true` for the domains that describe a file's name.
    pub fn is_name(&self) -> bool {
        matches!(self, Domain::FilePath | Domain::FileName | Domain::DirName)
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Domain::Any => "any",
            Domain::HostName => "host-name",
            Domain::DiskLabel => "disk-label",
            Domain::FilePath => "file-path",
            Domain::FileName => "file-name",
            Domain::DirName => "dir-name",
            Domain::FileContents => "file-contents",
            Domain::NameAndContents => "name-and-contents",
            Domain::NameOrContents => "name-or-contents",
            Domain::NetworkProtocol => "network-protocol",
        };
        f.write_str(name)
    }
}

/// The closed set of pattern kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Exact bit string.
    Lit(Literal),
    /// Any bit string with the given number of bits.
    Any(u64),
    /// A byte within `lo..=hi`.
    Range {
        /// Lower bound.
        lo: u8,
        /// Upper bound.
        hi: u8,
    },
    /// Zero-width assertion.
    Anchor(Anchor),
    /// The first sub-pattern that matches, in order.
    Alt(Subs),
    /// All the sub-patterns, one after the other.
    Seq(Subs),
    /// The sub-pattern applied repeatedly.
    Rep {
        /// Repeated pattern.
        sub: PatternId,
        /// Repetition bounds.
        repeat: Repeat,
    },
    /// The sub-pattern tagged with a domain.
    Ctx {
        /// Domain of the sub-pattern.
        domain: Domain,
        /// Wrapped pattern.
        sub: PatternId,
    },
}

impl Kind {
    /// Sub-patterns, in order.
    pub fn subs(&self) -> &[PatternId] {
        match self {
            Kind::Alt(subs) | Kind::Seq(subs) => subs.as_slice(),
            Kind::Rep { sub, .. } | Kind::Ctx { sub, .. } => {
                slice::from_ref(sub)
            }
            _ => &[],
        }
    }

    pub(crate) fn subs_mut(&mut self) -> &mut [PatternId] {
        match self {
            Kind::Alt(subs) | Kind::Seq(subs) => subs.as_mut_slice(),
            Kind::Rep { sub, .. } | Kind::Ctx { sub, .. } => {
                slice::from_mut(sub)
            }
            _ => &mut [],
        }
    }

    /// Returns `true` for patterns without sub-patterns.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Kind::Lit(_) | Kind::Any(_) | Kind::Range { .. } | Kind::Anchor(_)
        )
    }

    /// Returns `true` for patterns that combine any number of
    /// sub-patterns.
    pub fn is_multi(&self) -> bool {
        matches!(self, Kind::Alt(_) | Kind::Seq(_))
    }

    /// The empty sequence, which matches the empty string.
    pub fn empty() -> Self {
        Kind::Seq(Subs::new())
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Lit(lit) => write!(f, "lit {}", lit),
            Kind::Any(bits) => write!(f, "any {} bits", bits),
            Kind::Range { lo, hi } => {
                write!(f, "range {:#04x}-{:#04x}", lo, hi)
            }
            Kind::Anchor(anchor) => write!(f, "{}", anchor),
            Kind::Alt(_) => write!(f, "alt"),
            Kind::Seq(_) => write!(f, "seq"),
            Kind::Rep { repeat, .. } => write!(f, "rep {}", repeat),
            Kind::Ctx { domain, .. } => write!(f, "ctx {}", domain),
        }
    }
}
