/*! Canonical forms of patterns.

The canonical form of a pattern is a structurally minimal tree that has
exactly the same instances. Canonical trees are hash-consed: there's at most
one canonical node for each structure, so two canonical patterns are
structurally equal if and only if they have the same [`PatternId`].
*/

use itertools::{Itertools, MinMaxResult};
#[cfg(feature = "logging")]
use log::*;
use rustc_hash::FxHashMap;

use crate::errors::ConsistencyError;
use crate::patterns::{Kind, PatternId, PatternPool, Subs};
use crate::skips::ByteSet;

/// Result of simplifying a single node.
enum Simplified {
    /// The node is equivalent to an existing canonical pattern.
    Existing(PatternId),
    /// The node is equivalent to a node of this kind, whose sub-patterns
    /// are canonical.
    Kind(Kind),
}

impl PatternPool {
    /// Returns the canonical representative of a pattern, creating it if
    /// needed.
    ///
    /// Existing patterns are never modified, the canonical representative
    /// may be a new pattern that nothing retains yet. Canonicalization is
    /// idempotent: the canonical representative of a canonical pattern is
    /// the pattern itself.
    pub fn canonicalize(
        &mut self,
        id: PatternId,
    ) -> Result<PatternId, ConsistencyError> {
        let mut memo = FxHashMap::default();
        self.canonical_of(id, &mut memo)
    }

    /// Replaces `id` with its canonical representative in every pattern
    /// that embeds it.
    ///
    /// If `id` was embedded in other patterns and it's not retained, it is
    /// destroyed. Otherwise it stays alive until its last holder releases
    /// it. The returned pattern must be retained by the caller if it has to
    /// outlive `id`.
    pub fn mutating_canonicalize(
        &mut self,
        id: PatternId,
    ) -> Result<PatternId, ConsistencyError> {
        let canonical = self.canonicalize(id)?;

        if canonical == id {
            return Ok(id);
        }

        let node = self.node(id)?;
        let embedded = !node.supers.is_empty();
        let roots = node.roots;

        self.migrate_supers(id, canonical);

        if embedded && roots == 0 {
            self.destroy(id);
        }

        #[cfg(feature = "logging")]
        debug!("pattern {:?} canonicalized as {:?}", id, canonical);

        Ok(canonical)
    }

    /// Returns `true` if both patterns have the same structure. Metadata and
    /// matcher overrides are not taken into account.
    pub fn structurally_eq(&self, a: PatternId, b: PatternId) -> bool {
        if a == b {
            return true;
        }

        let (Some(x), Some(y)) = (self.get(a), self.get(b)) else {
            return false;
        };

        if x.cache.digest != y.cache.digest {
            return false;
        }

        match (&x.kind, &y.kind) {
            (Kind::Alt(s), Kind::Alt(t)) | (Kind::Seq(s), Kind::Seq(t)) => {
                s.len() == t.len()
                    && s.iter()
                        .zip(t.iter())
                        .all(|(s, t)| self.structurally_eq(*s, *t))
            }
            (
                Kind::Rep { sub: s, repeat: r },
                Kind::Rep { sub: t, repeat: q },
            ) => r == q && self.structurally_eq(*s, *t),
            (
                Kind::Ctx { domain: d, sub: s },
                Kind::Ctx { domain: e, sub: t },
            ) => d == e && self.structurally_eq(*s, *t),
            (k, l) => k.is_terminal() && k == l,
        }
    }

    fn canonical_of(
        &mut self,
        id: PatternId,
        memo: &mut FxHashMap<PatternId, PatternId>,
    ) -> Result<PatternId, ConsistencyError> {
        if let Some(canonical) = memo.get(&id) {
            return Ok(*canonical);
        }

        let node = self.node(id)?;

        if node.canonical {
            memo.insert(id, id);
            return Ok(id);
        }

        let mut kind = node.kind.clone();

        for sub in kind.subs_mut() {
            *sub = self.canonical_of(*sub, memo)?;
        }

        let canonical = match self.simplify(kind)? {
            Simplified::Existing(canonical) => canonical,
            Simplified::Kind(kind) => self.intern(kind, Some(id))?,
        };

        memo.insert(id, canonical);
        Ok(canonical)
    }

    /// Applies the simplification rules to a node whose sub-patterns are
    /// already canonical.
    fn simplify(
        &mut self,
        kind: Kind,
    ) -> Result<Simplified, ConsistencyError> {
        let simplified = match kind {
            Kind::Range { lo: 0x00, hi: 0xff } => {
                Simplified::Kind(Kind::Any(8))
            }
            Kind::Ctx { domain, sub } => match self.node(sub)?.kind {
                Kind::Ctx { domain: inner, .. } if inner == domain => {
                    Simplified::Existing(sub)
                }
                _ => Simplified::Kind(Kind::Ctx { domain, sub }),
            },
            Kind::Alt(subs) => self.simplify_alt(subs)?,
            Kind::Seq(subs) => self.simplify_seq(subs)?,
            Kind::Rep { sub, repeat } => match repeat.max {
                Some(1) if repeat.min == 1 => Simplified::Existing(sub),
                Some(0) => Simplified::Kind(Kind::empty()),
                Some(count) if repeat.is_fixed() => {
                    match self.node(sub)?.kind {
                        Kind::Any(bits) => match bits.checked_mul(count) {
                            Some(bits) => Simplified::Kind(Kind::Any(bits)),
                            None => {
                                Simplified::Kind(Kind::Rep { sub, repeat })
                            }
                        },
                        _ => Simplified::Kind(Kind::Rep { sub, repeat }),
                    }
                }
                _ => Simplified::Kind(Kind::Rep { sub, repeat }),
            },
            kind => Simplified::Kind(kind),
        };
        Ok(simplified)
    }

    fn simplify_alt(
        &mut self,
        subs: Subs,
    ) -> Result<Simplified, ConsistencyError> {
        let mut flat = Subs::new();

        for sub in subs {
            match &self.node(sub)?.kind {
                Kind::Alt(inner) => flat.extend_from_slice(inner),
                _ => flat.push(sub),
            }
        }

        // Canonical patterns are unique, removing duplicate ids removes
        // duplicate alternatives.
        let flat: Subs = flat.into_iter().unique().collect();

        if flat.len() == 1 {
            return Ok(Simplified::Existing(flat[0]));
        }

        if let Some(bytes) = self.single_bytes(&flat) {
            let bounds = match bytes.iter().minmax() {
                MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
                MinMaxResult::OneElement(b) => Some((b, b)),
                MinMaxResult::NoElements => None,
            };
            if let Some((lo, hi)) = bounds {
                if bytes.len() == (hi - lo) as usize + 1 {
                    return Ok(Simplified::Kind(if bytes.is_full() {
                        Kind::Any(8)
                    } else {
                        Kind::Range { lo, hi }
                    }));
                }
            }
        }

        Ok(Simplified::Kind(Kind::Alt(flat)))
    }

    /// If every pattern in `subs` matches a single byte value or a byte
    /// range, returns the union of the bytes they match.
    fn single_bytes(&self, subs: &[PatternId]) -> Option<ByteSet> {
        let mut bytes = ByteSet::new();
        for sub in subs {
            match &self.get(*sub)?.kind {
                Kind::Lit(lit) if lit.is_plain() && lit.len() == 8 => {
                    bytes.insert(lit.as_bytes()?[0]);
                }
                Kind::Range { lo, hi } => bytes.insert_range(*lo..=*hi),
                _ => return None,
            }
        }
        Some(bytes)
    }

    fn simplify_seq(
        &mut self,
        subs: Subs,
    ) -> Result<Simplified, ConsistencyError> {
        let mut flat = Subs::new();

        for sub in subs {
            if let Kind::Seq(inner) = &self.node(sub)?.kind {
                for sub in inner.clone() {
                    self.push_fused(&mut flat, sub)?;
                }
            } else {
                self.push_fused(&mut flat, sub)?;
            }
        }

        Ok(match flat.len() {
            0 => Simplified::Kind(Kind::empty()),
            1 => Simplified::Existing(flat[0]),
            _ => Simplified::Kind(Kind::Seq(flat)),
        })
    }

    /// Pushes `sub` at the end of a sequence, fusing it with the last
    /// element when both are compatible literals.
    fn push_fused(
        &mut self,
        seq: &mut Subs,
        sub: PatternId,
    ) -> Result<(), ConsistencyError> {
        let fused = match (seq.last(), &self.node(sub)?.kind) {
            (Some(last), Kind::Lit(next)) => match &self.node(*last)?.kind {
                Kind::Lit(prev)
                    if prev.flags() == next.flags()
                        && (prev.is_plain()
                            || (prev.as_bytes().is_some()
                                && next.as_bytes().is_some())) =>
                {
                    Some(prev.concat(next))
                }
                _ => None,
            },
            _ => None,
        };

        match fused {
            Some(lit) => {
                let id = self.intern(Kind::Lit(lit), None)?;
                if let Some(last) = seq.last_mut() {
                    *last = id;
                }
            }
            None => seq.push(sub),
        }

        Ok(())
    }

    /// Returns the canonical node with the given kind, whose sub-patterns
    /// must be canonical. `origin` is the pattern being canonicalized, it
    /// becomes the canonical node itself when its structure is already
    /// canonical. Otherwise, its metadata and matcher are carried over.
    fn intern(
        &mut self,
        kind: Kind,
        origin: Option<PatternId>,
    ) -> Result<PatternId, ConsistencyError> {
        let digest = self.compute_digest(&kind);

        let existing = self.canonical.get(&digest).and_then(|ids| {
            ids.iter()
                .copied()
                .find(|id| self.get(*id).is_some_and(|n| n.kind == kind))
        });

        let (meta, matcher) = match origin.and_then(|id| self.get(id)) {
            Some(node) => (Some(node.meta.clone()), node.matcher),
            None => (None, None),
        };

        if let Some(id) = existing {
            if let Some(node) = self.get_mut(id) {
                if node.matcher.is_none() {
                    node.matcher = matcher;
                }
            }
            return Ok(id);
        }

        let id = match origin {
            Some(origin) if self.node(origin)?.kind == kind => origin,
            _ => {
                let id = self.insert(kind)?;
                let node = self.node_mut(id)?;
                if let Some(meta) = meta {
                    node.meta = meta;
                }
                node.matcher = matcher;
                id
            }
        };

        self.node_mut(id)?.canonical = true;
        self.canonical.entry(digest).or_default().push(id);

        Ok(id)
    }
}
