use bitvec::prelude::*;
#[cfg(feature = "logging")]
use log::*;
use rand::Rng;

use crate::bits::{BitRange, BYTE};
use crate::errors::{SelfCheckError, SelfCheckFailure};
use crate::patterns::{Kind, PatternId, PatternPool, Repeat};

/// Number of instances generated before giving up on fitting the size
/// bound.
const MAX_ATTEMPTS: usize = 16;

/// Extra repetitions allowed when a repeated pattern can be empty.
const NULLABLE_GROWTH: u64 = 4;

/// Random instances.
impl PatternPool {
    /// Generates a random instance of a pattern whose bit length lies
    /// within `size_bound` (both ends included).
    ///
    /// Unbounded repetitions grow at most by the number of bits set with
    /// [`PatternPool::set_growth_bits`]. Anchors don't produce any bit, so
    /// the line and word anchors may not hold in the generated instance.
    /// Returns `None` if no instance fits in `size_bound`.
    pub fn rand<R: Rng>(
        &self,
        id: PatternId,
        size_bound: BitRange,
        rng: &mut R,
    ) -> Option<BitVec<u8, Msb0>> {
        let sample = self.sample_range(id);

        if !sample.is_defined() || !size_bound.is_defined() {
            return None;
        }

        if sample.low > size_bound.high || sample.high < size_bound.low {
            return None;
        }

        for _ in 0..MAX_ATTEMPTS {
            let mut bits = BitVec::new();
            if !self.gen(id, size_bound.high, rng, &mut bits) {
                continue;
            }
            if size_bound.admits(bits.len() as u64) {
                return Some(bits);
            }
        }

        None
    }

    /// Generates `instances` random instances of a pattern and checks that
    /// the pattern matches each of them at offset 0. Instances that start
    /// with a whole byte must not start with a byte rejected by the
    /// pattern's skip table.
    pub fn self_check<R: Rng>(
        &self,
        id: PatternId,
        instances: usize,
        rng: &mut R,
    ) -> Result<(), SelfCheckError> {
        let skips = self.skip_table(id);

        for _ in 0..instances {
            let Some(mut instance) = self.rand(id, BitRange::full(), rng)
            else {
                break;
            };

            let bits = instance.len() as u64;
            instance.set_uninitialized(false);
            let bytes = instance.into_vec();

            let failure = if self.match_at(id, &bytes, 0).is_none() {
                Some(SelfCheckFailure::NoMatch)
            } else if bits >= BYTE && skips.can_skip(bytes[0]) {
                Some(SelfCheckFailure::Skipped)
            } else {
                None
            };

            if let Some(failure) = failure {
                #[cfg(feature = "logging")]
                warn!(
                    "self-check of pattern {:?} failed on {:02x?}: {:?}",
                    id, bytes, failure
                );
                return Err(SelfCheckError {
                    pattern: id,
                    instance: bytes,
                    bits,
                    failure,
                });
            }
        }

        Ok(())
    }

    /// Appends a random instance of `id` to `out`, producing at most
    /// `budget` bits when possible. Returns `false` if the pattern has no
    /// instances.
    fn gen<R: Rng>(
        &self,
        id: PatternId,
        budget: u64,
        rng: &mut R,
        out: &mut BitVec<u8, Msb0>,
    ) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };

        match &node.kind {
            Kind::Lit(lit) => {
                match lit.as_bytes() {
                    Some(bytes) if !lit.is_plain() => {
                        for byte in bytes {
                            let variants = lit.variants(*byte);
                            let pick =
                                variants[rng.gen_range(0..variants.len())];
                            out.extend_from_bitslice(
                                pick.view_bits::<Msb0>(),
                            );
                        }
                    }
                    _ => out.extend_from_bitslice(lit.bits()),
                }
                true
            }
            Kind::Any(bits) => {
                out.extend((0..*bits).map(|_| rng.gen::<bool>()));
                true
            }
            Kind::Range { lo, hi } => {
                let byte: u8 = rng.gen_range(*lo..=*hi);
                out.extend_from_bitslice(byte.view_bits::<Msb0>());
                true
            }
            Kind::Anchor(_) => true,
            Kind::Alt(subs) => {
                let defined: Vec<PatternId> = subs
                    .iter()
                    .copied()
                    .filter(|sub| self.sample_range(*sub).is_defined())
                    .collect();
                // Prefer the alternatives that fit in the budget.
                let fitting: Vec<PatternId> = defined
                    .iter()
                    .copied()
                    .filter(|sub| self.sample_range(*sub).low <= budget)
                    .collect();
                let candidates =
                    if fitting.is_empty() { defined } else { fitting };
                if candidates.is_empty() {
                    return false;
                }
                let pick = candidates[rng.gen_range(0..candidates.len())];
                self.gen(pick, budget, rng, out)
            }
            Kind::Seq(subs) => {
                let start = out.len() as u64;
                // Bits that the remaining sub-patterns need at least.
                let mut reserved: u64 = subs
                    .iter()
                    .map(|sub| self.sample_range(*sub).low)
                    .fold(0, u64::saturating_add);
                for sub in subs {
                    reserved =
                        reserved.saturating_sub(self.sample_range(*sub).low);
                    let used = out.len() as u64 - start;
                    let sub_budget =
                        budget.saturating_sub(used).saturating_sub(reserved);
                    if !self.gen(*sub, sub_budget, rng, out) {
                        return false;
                    }
                }
                true
            }
            Kind::Rep { sub, repeat } => {
                self.gen_repeat(*sub, repeat, budget, rng, out)
            }
            Kind::Ctx { sub, .. } => self.gen(*sub, budget, rng, out),
        }
    }

    fn gen_repeat<R: Rng>(
        &self,
        sub: PatternId,
        repeat: &Repeat,
        budget: u64,
        rng: &mut R,
        out: &mut BitVec<u8, Msb0>,
    ) -> bool {
        let sample = self.sample_range(sub);

        if !sample.is_defined() {
            return repeat.min == 0;
        }

        let growth = if sample.low == 0 {
            NULLABLE_GROWTH
        } else {
            self.growth_bits / sample.low
        };

        // Repetitions that fit in the budget, never less than the minimum.
        let fit = if sample.low == 0 {
            u64::MAX
        } else {
            budget / sample.low
        };

        let max = repeat
            .max
            .unwrap_or(u64::MAX)
            .min(repeat.min.saturating_add(growth))
            .min(fit.max(repeat.min));

        let count = if max > repeat.min {
            rng.gen_range(repeat.min..=max)
        } else {
            repeat.min
        };

        let start = out.len() as u64;

        for done in 0..count {
            let used = out.len() as u64 - start;
            let reserved = (count - done - 1).saturating_mul(sample.low);
            let sub_budget =
                budget.saturating_sub(used).saturating_sub(reserved);
            if !self.gen(sub, sub_budget, rng, out) {
                return false;
            }
        }

        true
    }
}
