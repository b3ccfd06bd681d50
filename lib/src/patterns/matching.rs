use bitvec::prelude::*;

use crate::bits::{is_byte_aligned, to_bit, to_byte, BitRange, BYTE, INF};
use crate::hit::Hit;
use crate::mode::MatchMode;
use crate::patterns::{Kind, Node, PatternId, PatternPool, Repeat};

/// The buffer being matched.
struct Input<'a> {
    data: &'a [u8],
    bits: &'a BitSlice<u8, Msb0>,
}

/// States of the repetition matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RepState {
    /// No repetition has been matched yet.
    Pending,
    /// At least one repetition has been matched.
    Matching,
    /// No more repetitions are possible.
    Exhausted,
}

impl PatternPool {
    /// Matches a pattern against the `region` of `data`.
    ///
    /// The region is clipped to the size of the buffer. With
    /// [`MatchMode::Partial`], the result is the first occurrence of the
    /// pattern that starts at or after `region.low`, trying every offset
    /// `region.low + 8 * k`. The other modes require the match to start
    /// exactly at `region.low`. Returns `None` if the pattern doesn't match.
    ///
    /// Anchors like [`crate::Anchor::Eob`] are evaluated relative to the
    /// whole buffer, not to the region.
    pub fn match_in(
        &self,
        id: PatternId,
        data: &[u8],
        region: BitRange,
        mode: MatchMode,
    ) -> Option<Hit> {
        let node = self.get(id)?;
        let end = to_bit(data.len() as u64);

        if region.low > end || !region.is_defined() {
            return None;
        }

        let region = region.clip(end);

        if let Some(matcher) = node.matcher {
            let window = &data[..to_byte(region.high) as usize];
            return matcher(window, region.low, mode).filter(|hit| {
                hit.offset >= region.low
                    && hit.end() <= region.high
                    && (mode == MatchMode::Partial || hit.offset == region.low)
                    && (mode != MatchMode::Full || hit.end() == region.high)
            });
        }

        let input = Input { data, bits: data.view_bits::<Msb0>() };

        match mode {
            MatchMode::Anchored => {
                self.local(id, &input, region.low, region.high)
            }
            MatchMode::Full => self
                .local(id, &input, region.low, region.high)
                .filter(|hit| hit.end() == region.high),
            MatchMode::Partial => self.search(id, node, &input, region),
        }
    }

    /// Matches a pattern anchored at bit offset `at` of `data`.
    pub fn match_at(
        &self,
        id: PatternId,
        data: &[u8],
        at: u64,
    ) -> Option<Hit> {
        self.match_in(id, data, BitRange::new(at, INF), MatchMode::Anchored)
    }

    /// Returns `true` if the pattern matches the first `len` bits of `data`
    /// entirely.
    pub(crate) fn accepts(
        &self,
        id: PatternId,
        data: &[u8],
        len: u64,
    ) -> bool {
        self.match_in(id, data, BitRange::new(0, len), MatchMode::Full)
            .is_some()
    }

    /// Looks for the first offset where the pattern matches, discarding the
    /// byte-aligned candidates rejected by the skip table.
    fn search(
        &self,
        id: PatternId,
        node: &Node,
        input: &Input,
        region: BitRange,
    ) -> Option<Hit> {
        let skips = &node.cache.skips;
        // Only whole bytes before the end of the region are subject to
        // skipping.
        let last = to_byte(region.high) as usize;
        let mut at = region.low;

        loop {
            if is_byte_aligned(at) && !skips.is_trivial() {
                let next = skips.next_candidate(
                    &input.data[..last],
                    to_byte(at) as usize,
                );
                at = to_bit(next as u64).max(at);
            }

            if let Some(hit) = self.local(id, input, at, region.high) {
                return Some(hit);
            }

            at = at.checked_add(BYTE)?;

            if at > region.high {
                return None;
            }
        }
    }

    /// Matches the pattern starting exactly at `at`, without consuming bits
    /// past `limit`.
    fn local(
        &self,
        id: PatternId,
        input: &Input,
        at: u64,
        limit: u64,
    ) -> Option<Hit> {
        let node = self.get(id)?;

        if let Some(matcher) = node.matcher {
            let window = &input.data[..to_byte(limit) as usize];
            return matcher(window, at, MatchMode::Anchored)
                .filter(|hit| hit.offset == at && hit.end() <= limit);
        }

        let sample = node.cache.sample;

        if !sample.is_defined() || sample.low > limit - at {
            return None;
        }

        match &node.kind {
            Kind::Lit(lit) => lit
                .matches_at(input.bits, at, limit)
                .then(|| Hit::new(at, lit.len())),
            Kind::Any(bits) => Some(Hit::new(at, *bits)),
            Kind::Range { lo, hi } => {
                let bits = &input.bits[at as usize..(at + BYTE) as usize];
                let byte = bits.load_be::<u8>();
                (*lo..=*hi).contains(&byte).then(|| Hit::new(at, BYTE))
            }
            Kind::Anchor(anchor) => {
                anchor.holds(input.data, at).then(|| Hit::empty_at(at))
            }
            Kind::Alt(subs) => {
                subs.iter().find_map(|sub| self.local(*sub, input, at, limit))
            }
            Kind::Seq(subs) => {
                let mut hit = Hit::empty_at(at);
                for sub in subs {
                    let next = self.local(*sub, input, hit.end(), limit)?;
                    hit.include(&next);
                }
                Some(hit)
            }
            Kind::Rep { sub, repeat } => {
                self.repeat(*sub, repeat, input, at, limit)
            }
            Kind::Ctx { sub, .. } => self.local(*sub, input, at, limit),
        }
    }

    /// Applies `sub` as many times as possible, up to the maximum allowed by
    /// `repeat`. Repetitions are greedy and never give back bits.
    fn repeat(
        &self,
        sub: PatternId,
        repeat: &Repeat,
        input: &Input,
        at: u64,
        limit: u64,
    ) -> Option<Hit> {
        let mut hit = Hit::empty_at(at);
        let mut count = 0;
        let mut state = RepState::Pending;

        while state != RepState::Exhausted {
            if repeat.max.is_some_and(|max| count >= max) {
                state = RepState::Exhausted;
                continue;
            }
            state = match self.local(sub, input, hit.end(), limit) {
                Some(next) => {
                    hit.include(&next);
                    count += 1;
                    if next.is_empty() {
                        // An empty match can be repeated as many times as
                        // needed without consuming anything else.
                        count = count.max(repeat.min);
                        RepState::Exhausted
                    } else {
                        RepState::Matching
                    }
                }
                None => RepState::Exhausted,
            };
        }

        (count >= repeat.min).then_some(hit)
    }
}
