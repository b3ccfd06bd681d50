/*! Hand-optimized matchers.

A pattern can carry a [`Matcher`] that replaces the generic matching
algorithm. The functions in this module are matchers for patterns that are
common enough to deserve a specialized implementation, such as byte classes
and identifiers. Each of them accepts exactly the same instances as the
pattern tree it is attached to.
*/

use bitvec::prelude::*;
use rustc_hash::FxHashSet;

use crate::bits::{is_byte_aligned, to_bit, BYTE};
use crate::errors::BuildError;
use crate::hit::Hit;
use crate::mode::MatchMode;
use crate::patterns::{Kind, PatternId, PatternPool, Repeat};

/// A function that matches a pattern in `data` starting at the given bit
/// offset.
///
/// `data` only includes the whole bytes of the region being matched. With
/// [`MatchMode::Partial`] the function must return the first match at or
/// after the offset, otherwise the match must start exactly at the offset.
pub type Matcher =
    fn(data: &[u8], offset: u64, mode: MatchMode) -> Option<Hit>;

/// Returns the byte that starts at bit offset `at`.
#[inline]
fn byte_at(data: &[u8], at: u64) -> Option<u8> {
    let end = at.checked_add(BYTE)?;
    if end > to_bit(data.len() as u64) {
        return None;
    }
    if is_byte_aligned(at) {
        return data.get((at / BYTE) as usize).copied();
    }
    Some(data.view_bits::<Msb0>()[at as usize..end as usize].load_be::<u8>())
}

/// Matches a single byte that satisfies `pred`.
fn byte_class<P>(data: &[u8], at: u64, mode: MatchMode, pred: P) -> Option<Hit>
where
    P: Fn(u8) -> bool,
{
    if mode.is_anchored() {
        return byte_at(data, at)
            .filter(|b| pred(*b))
            .map(|_| Hit::new(at, BYTE));
    }
    if is_byte_aligned(at) {
        let from = (at / BYTE) as usize;
        return data
            .get(from..)?
            .iter()
            .position(|b| pred(*b))
            .map(|pos| Hit::new(to_bit((from + pos) as u64), BYTE));
    }
    let mut offset = at;
    while let Some(byte) = byte_at(data, offset) {
        if pred(byte) {
            return Some(Hit::new(offset, BYTE));
        }
        offset += BYTE;
    }
    None
}

/// Matches an ASCII decimal digit.
pub fn ascii_digit(data: &[u8], at: u64, mode: MatchMode) -> Option<Hit> {
    byte_class(data, at, mode, |b| b.is_ascii_digit())
}

/// Matches an ASCII hexadecimal digit.
pub fn ascii_hexdigit(data: &[u8], at: u64, mode: MatchMode) -> Option<Hit> {
    byte_class(data, at, mode, |b| b.is_ascii_hexdigit())
}

/// Matches an ASCII lowercase letter.
pub fn ascii_lowercase(data: &[u8], at: u64, mode: MatchMode) -> Option<Hit> {
    byte_class(data, at, mode, |b| b.is_ascii_lowercase())
}

/// Matches an ASCII uppercase letter.
pub fn ascii_uppercase(data: &[u8], at: u64, mode: MatchMode) -> Option<Hit> {
    byte_class(data, at, mode, |b| b.is_ascii_uppercase())
}

/// Matches an ASCII letter.
pub fn ascii_alphabetic(
    data: &[u8],
    at: u64,
    mode: MatchMode,
) -> Option<Hit> {
    byte_class(data, at, mode, |b| b.is_ascii_alphabetic())
}

/// Matches a byte with no bits set outside of `MASK`, that is, a byte in
/// the range `0..=MASK` when `MASK` is of the form `2^k - 1`.
pub fn mask<const MASK: u8>(
    data: &[u8],
    at: u64,
    mode: MatchMode,
) -> Option<Hit> {
    byte_class(data, at, mode, |b| b & !MASK == 0)
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Matches a C identifier: a letter or underscore followed by any number of
/// letters, digits and underscores. Only byte-aligned offsets are supported,
/// an unaligned offset never matches.
pub fn c_identifier(data: &[u8], at: u64, mode: MatchMode) -> Option<Hit> {
    if !is_byte_aligned(at) {
        return None;
    }
    let from = (at / BYTE) as usize;
    let start = if mode.is_anchored() {
        data.get(from).copied().filter(|b| is_ident_start(*b))?;
        from
    } else {
        from + data.get(from..)?.iter().position(|b| is_ident_start(*b))?
    };
    let len = 1 + data[start + 1..]
        .iter()
        .take_while(|b| is_ident_byte(**b))
        .count();
    Some(Hit::new(to_bit(start as u64), to_bit(len as u64)))
}

/// Returns the builtin matcher equivalent to the byte range `lo..=hi`, if
/// any.
pub(crate) fn range_matcher(lo: u8, hi: u8) -> Option<Matcher> {
    let matcher: Matcher = match (lo, hi) {
        (b'0', b'9') => ascii_digit,
        (b'a', b'z') => ascii_lowercase,
        (b'A', b'Z') => ascii_uppercase,
        (0, 0x01) => mask::<0x01>,
        (0, 0x03) => mask::<0x03>,
        (0, 0x07) => mask::<0x07>,
        (0, 0x0f) => mask::<0x0f>,
        (0, 0x1f) => mask::<0x1f>,
        (0, 0x3f) => mask::<0x3f>,
        (0, 0x7f) => mask::<0x7f>,
        _ => return None,
    };
    Some(matcher)
}

/// Constructors for patterns that come with a builtin matcher.
impl PatternPool {
    /// Creates a pattern that matches an ASCII decimal digit.
    pub fn digit(&mut self) -> Result<PatternId, BuildError> {
        let id = self.range(b'0', b'9')?;
        self.set_matcher(id, Some(ascii_digit))?;
        Ok(id)
    }

    /// Creates a pattern that matches an ASCII hexadecimal digit.
    pub fn hex_digit(&mut self) -> Result<PatternId, BuildError> {
        let digit = self.range(b'0', b'9')?;
        let lower = self.range(b'a', b'f')?;
        let upper = self.range(b'A', b'F')?;
        let id = self.alt(&[digit, lower, upper])?;
        self.set_matcher(id, Some(ascii_hexdigit))?;
        Ok(id)
    }

    /// Creates a pattern that matches an ASCII letter.
    pub fn letter(&mut self) -> Result<PatternId, BuildError> {
        let lower = self.range(b'a', b'z')?;
        let upper = self.range(b'A', b'Z')?;
        let id = self.alt(&[lower, upper])?;
        self.set_matcher(id, Some(ascii_alphabetic))?;
        Ok(id)
    }

    /// Creates a pattern that matches a C identifier.
    pub fn c_identifier(&mut self) -> Result<PatternId, BuildError> {
        let lower = self.range(b'a', b'z')?;
        let upper = self.range(b'A', b'Z')?;
        let underscore = self.lit(b"_")?;
        let digit = self.range(b'0', b'9')?;
        let start = self.alt(&[lower, upper, underscore])?;
        let rest = self.alt(&[lower, upper, digit, underscore])?;
        let tail = self.rep(rest, Repeat::at_least(0))?;
        let id = self.seq(&[start, tail])?;
        self.set_matcher(id, Some(c_identifier))?;
        Ok(id)
    }

    /// Attaches builtin matchers to the byte ranges under `id` that have
    /// one. Returns the number of patterns that got a matcher.
    pub fn auto_detect_matchers(&mut self, id: PatternId) -> usize {
        let mut detected = Vec::new();
        let mut stack = vec![id];
        let mut visited = FxHashSet::default();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            if let Kind::Range { lo, hi } = node.kind {
                if node.matcher.is_none() {
                    if let Some(matcher) = range_matcher(lo, hi) {
                        detected.push((id, matcher));
                    }
                }
            }
            stack.extend_from_slice(node.kind.subs());
        }

        for (id, matcher) in detected.iter() {
            if let Some(node) = self.get_mut(*id) {
                node.matcher = Some(*matcher);
            }
        }

        detected.len()
    }
}
