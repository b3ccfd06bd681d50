use crate::bits::BitRange;
use crate::patterns::{Kind, PatternId, PatternPool};

/// Generalization order between patterns.
///
/// Pattern `a` generalizes pattern `b` when every instance of `b` is also an
/// instance of `a`. The answers are conservative: `false` means that the
/// relation couldn't be proven, not that it doesn't hold.
impl PatternPool {
    /// Returns `true` if every instance of `b` is an instance of `a`.
    pub fn generalizes(&self, a: PatternId, b: PatternId) -> bool {
        if a == b || self.structurally_eq(a, b) {
            return true;
        }

        let (Some(x), Some(y)) = (self.get(a), self.get(b)) else {
            return false;
        };

        // Contexts must agree on the domain. A context that wraps only one
        // side is transparent.
        match (&x.kind, &y.kind) {
            (
                Kind::Ctx { domain: d, sub: s },
                Kind::Ctx { domain: e, sub: t },
            ) => return d == e && self.generalizes(*s, *t),
            (Kind::Ctx { sub, .. }, _) => return self.generalizes(*sub, b),
            (_, Kind::Ctx { sub, .. }) => return self.generalizes(a, *sub),
            _ => {}
        }

        let sa = x.cache.sample;
        let sb = y.cache.sample;

        // A pattern without instances is generalized by anything.
        if !sb.is_defined() {
            return true;
        }

        if !sa.is_defined() || !contains(&sa, &sb) {
            return false;
        }

        if let Kind::Alt(alts) = &y.kind {
            return alts.iter().all(|alt| self.generalizes(a, *alt));
        }

        // Anchors depend on the bytes around the match, which a standalone
        // instance of `b` doesn't have.
        let anchored = self.has_anchors(a);

        if let Some(instance) = self.constant(b).filter(|_| !anchored) {
            let len = instance.len() as u64;
            let mut instance = instance;
            instance.set_uninitialized(false);
            return self.accepts(a, instance.as_raw_slice(), len);
        }

        match (&x.kind, &y.kind) {
            (Kind::Alt(alts), _) => {
                alts.iter().any(|alt| self.generalizes(*alt, b))
            }
            (Kind::Any(bits), _) => sb == BitRange::fixed(*bits),
            (Kind::Range { lo, hi }, Kind::Range { lo: l, hi: h }) => {
                lo <= l && h <= hi
            }
            // Matching never gives back what an element consumed, so every
            // element but the last must consume as much as its counterpart.
            (Kind::Seq(s), Kind::Seq(t)) => {
                let last = s.len().saturating_sub(1);
                s.len() == t.len()
                    && s.iter().zip(t.iter()).enumerate().all(|(i, (x, y))| {
                        (i == last || self.same_width(*x, *y))
                            && self.generalizes(*x, *y)
                    })
            }
            (
                Kind::Rep { sub: s, repeat: r },
                Kind::Rep { sub: t, repeat: q },
            ) => {
                r.covers(q)
                    && self.same_width(*s, *t)
                    && self.generalizes(*s, *t)
            }
            (Kind::Rep { sub, repeat }, _) => {
                repeat.allows(1) && self.generalizes(*sub, b)
            }
            _ => false,
        }
    }

    /// Returns `true` if every instance of `a` is an instance of `b`.
    pub fn specializes(&self, a: PatternId, b: PatternId) -> bool {
        self.generalizes(b, a)
    }

    /// Removes from `ids` every pattern whose instances are all instances
    /// of another pattern in the list. When two patterns generalize each
    /// other, the first one is kept. The relative order of the patterns that
    /// remain is preserved.
    pub fn prune_specializations(&self, ids: &[PatternId]) -> Vec<PatternId> {
        let mut kept = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            let redundant = ids.iter().enumerate().any(|(j, other)| {
                i != j
                    && self.generalizes(*other, *id)
                    && (j < i || !self.generalizes(*id, *other))
            });
            if !redundant {
                kept.push(*id);
            }
        }

        kept
    }

    /// Returns `true` if both patterns have the same fixed instance length.
    fn same_width(&self, a: PatternId, b: PatternId) -> bool {
        let sample = self.sample_range(a);
        sample.is_defined()
            && sample.low == sample.high
            && sample == self.sample_range(b)
    }

    /// Returns `true` if there is some anchor in the tree under `id`.
    fn has_anchors(&self, id: PatternId) -> bool {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match self.get(id).map(|node| &node.kind) {
                Some(Kind::Anchor(_)) => return true,
                Some(kind) => stack.extend_from_slice(kind.subs()),
                None => {}
            }
        }
        false
    }
}

/// Returns `true` if every length in `inner` is also in `outer`.
#[inline]
fn contains(outer: &BitRange, inner: &BitRange) -> bool {
    outer.low <= inner.low && inner.high <= outer.high
}
