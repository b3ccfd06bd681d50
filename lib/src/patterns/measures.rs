use std::collections::BTreeMap;

use bitvec::prelude::*;

use crate::bits::{BitRange, INF};
use crate::patterns::{Kind, PatternId, PatternPool, Repeat};

/// Maximum number of distinct lengths tracked while counting instances.
/// Beyond this limit the count saturates.
const MAX_LENGTH_CLASSES: usize = 4096;

/// Maximum number of repetitions expanded while counting instances.
const MAX_REPETITIONS: u64 = 4096;

/// How uniform the instances of a pattern are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Uniformity {
    /// Instances have different sizes.
    None,
    /// All instances have the same size.
    Size,
    /// There's a single instance.
    Contents,
}

/// Number of derivations of a pattern, grouped by bit length.
#[derive(Clone, Debug, Default)]
struct Counts {
    by_len: BTreeMap<u64, u64>,
    saturated: bool,
}

impl Counts {
    fn single(len: u64, count: u64, cap: u64) -> Self {
        let mut counts = Counts::default();
        if len <= cap && count > 0 {
            counts.by_len.insert(len, count);
        }
        counts
    }

    fn saturated() -> Self {
        Counts { by_len: BTreeMap::new(), saturated: true }
    }

    fn is_empty(&self) -> bool {
        self.by_len.is_empty()
    }

    fn add(&mut self, other: &Counts) {
        self.saturated |= other.saturated;
        for (len, count) in other.by_len.iter() {
            let entry = self.by_len.entry(*len).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
        self.check_size();
    }

    /// Counts for the concatenation of an instance from `self` and one from
    /// `other`, discarding lengths above `cap`.
    fn concat(&self, other: &Counts, cap: u64) -> Counts {
        let mut result = Counts {
            by_len: BTreeMap::new(),
            saturated: self.saturated || other.saturated,
        };
        for (a_len, a_count) in self.by_len.iter() {
            for (b_len, b_count) in other.by_len.iter() {
                let len = a_len.saturating_add(*b_len);
                if len > cap {
                    // Lengths are sorted, longer ones won't fit either.
                    break;
                }
                let entry = result.by_len.entry(len).or_insert(0);
                *entry =
                    entry.saturating_add(a_count.saturating_mul(*b_count));
            }
        }
        result.check_size();
        result
    }

    fn check_size(&mut self) {
        if self.by_len.len() > MAX_LENGTH_CLASSES {
            self.saturated = true;
        }
    }

    fn total(&self, bound: &BitRange) -> u64 {
        if self.saturated {
            return u64::MAX;
        }
        self.by_len
            .range(bound.low..=bound.high)
            .fold(0_u64, |acc, (_, count)| acc.saturating_add(*count))
    }
}

impl PatternPool {
    /// Number of distinct instances of a pattern whose bit length lies
    /// within `bound` (both ends included). The result saturates at
    /// `u64::MAX`, which is also returned when the number of instances is
    /// unbounded or too large to be computed.
    ///
    /// Instances are counted by derivation: an alternation whose
    /// alternatives produce the same string counts it more than once.
    pub fn complexity(&self, id: PatternId, bound: BitRange) -> u64 {
        if !bound.is_defined() || !self.contains(id) {
            return 0;
        }
        let sample = self.sample_range(id);
        if !sample.overlaps(&bound) {
            return 0;
        }
        let cap = bound.high.min(sample.high);
        self.counts(id, cap).total(&bound)
    }

    /// Returns `true` if the pattern has exactly one instance.
    pub fn is_constant(&self, id: PatternId) -> bool {
        self.complexity(id, BitRange::full()) == 1
    }

    /// Returns the only instance of a constant pattern.
    pub fn constant(&self, id: PatternId) -> Option<BitVec<u8, Msb0>> {
        if !self.is_constant(id) {
            return None;
        }
        let mut bits = BitVec::new();
        self.constant_into(id, &mut bits).then_some(bits)
    }

    fn constant_into(
        &self,
        id: PatternId,
        out: &mut BitVec<u8, Msb0>,
    ) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        match &node.kind {
            Kind::Lit(lit) => match lit.as_bytes() {
                // A literal with flags is constant only if its flags don't
                // apply to any of its bytes.
                Some(bytes) if !lit.is_plain() => {
                    if bytes.iter().any(|b| lit.variants(*b).len() > 1) {
                        return false;
                    }
                    out.extend_from_bitslice(lit.bits());
                    true
                }
                _ => {
                    out.extend_from_bitslice(lit.bits());
                    true
                }
            },
            Kind::Range { lo, hi } if lo == hi => {
                out.extend_from_bitslice(lo.view_bits::<Msb0>());
                true
            }
            Kind::Anchor(_) => true,
            Kind::Alt(subs) => subs
                .iter()
                .find(|sub| self.sample_range(**sub).is_defined())
                .is_some_and(|sub| self.constant_into(*sub, out)),
            Kind::Seq(subs) => {
                subs.iter().all(|sub| self.constant_into(*sub, out))
            }
            Kind::Rep { sub, repeat } => {
                let count = match repeat.max {
                    Some(max) if max == repeat.min => max,
                    // A variable repetition is constant only when its
                    // sub-pattern has no instances and the repetition can
                    // be skipped.
                    _ => 0,
                };
                (0..count).all(|_| self.constant_into(*sub, out))
            }
            Kind::Ctx { sub, .. } => self.constant_into(*sub, out),
            Kind::Any(_) | Kind::Range { .. } => false,
        }
    }

    /// Returns how uniform the instances of a pattern are.
    pub fn uniformity(&self, id: PatternId) -> Uniformity {
        let sample = self.sample_range(id);
        if !sample.is_defined() || !sample.is_degenerate() {
            Uniformity::None
        } else if self.is_constant(id) {
            Uniformity::Contents
        } else {
            Uniformity::Size
        }
    }

    fn counts(&self, id: PatternId, cap: u64) -> Counts {
        let Some(node) = self.get(id) else {
            return Counts::default();
        };
        match &node.kind {
            Kind::Lit(lit) => {
                // Each byte affected by the flags contributes its variants.
                let count = match lit.as_bytes() {
                    Some(bytes) if !lit.is_plain() => {
                        bytes.iter().fold(1_u64, |acc, b| {
                            acc.saturating_mul(lit.variants(*b).len() as u64)
                        })
                    }
                    _ => 1,
                };
                Counts::single(lit.len(), count, cap)
            }
            Kind::Any(bits) => {
                if *bits >= 64 && *bits <= cap {
                    return Counts::saturated();
                }
                Counts::single(*bits, 1_u64 << (*bits).min(63), cap)
            }
            Kind::Range { lo, hi } => {
                Counts::single(8, (*hi - *lo) as u64 + 1, cap)
            }
            Kind::Anchor(_) => Counts::single(0, 1, cap),
            Kind::Alt(subs) => {
                let mut counts = Counts::default();
                for sub in subs {
                    counts.add(&self.counts(*sub, cap));
                }
                counts
            }
            Kind::Seq(subs) => {
                let mut counts = Counts::single(0, 1, cap);
                for sub in subs {
                    if counts.is_empty() {
                        break;
                    }
                    counts = counts.concat(&self.counts(*sub, cap), cap);
                }
                counts
            }
            Kind::Rep { sub, repeat } => {
                self.repeat_counts(*sub, repeat, cap)
            }
            Kind::Ctx { sub, .. } => self.counts(*sub, cap),
        }
    }

    fn repeat_counts(
        &self,
        sub: PatternId,
        repeat: &Repeat,
        cap: u64,
    ) -> Counts {
        let sub = self.counts(sub, cap);

        if sub.saturated {
            return Counts::saturated();
        }

        let mut result = Counts::default();

        if repeat.min == 0 {
            result.add(&Counts::single(0, 1, cap));
        }

        if sub.is_empty() {
            return result;
        }

        // Unbounded repetitions of a pattern that has instances in range
        // produce unbounded instances when either the cap is unbounded or
        // the pattern can match the empty string.
        if repeat.max.is_none() && (cap == INF || sub.by_len.contains_key(&0))
        {
            return Counts::saturated();
        }

        let max = repeat.max.unwrap_or(u64::MAX);
        let mut power = Counts::single(0, 1, cap);
        let mut k = 0;

        while k < max {
            k += 1;
            if k > MAX_REPETITIONS {
                return Counts::saturated();
            }
            power = power.concat(&sub, cap);
            if power.is_empty() || power.saturated {
                break;
            }
            if k >= repeat.min {
                result.add(&power);
            }
        }

        result.saturated |= power.saturated;
        result
    }
}
