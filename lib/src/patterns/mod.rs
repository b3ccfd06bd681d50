/*! Pattern trees and the arena that owns them.

Patterns are built from a small closed set of kinds (see [`Kind`]): literal
bit strings, "any N bits", byte ranges, zero-width anchors, alternations,
sequences, repetitions and domain contexts. Every pattern lives in a
[`PatternPool`] and is addressed by a [`PatternId`]. Composite patterns
refer to their sub-patterns by id, and every pattern keeps the set of
composite patterns that embed it (its *supers*).

The pool owns the lifetime of every pattern. A pattern stays alive while it
is retained by some external holder (see [`PatternPool::retain`]) or while
it is embedded in another live pattern. Patterns that have neither roots nor
supers are destroyed by [`PatternPool::release`] and [`PatternPool::sweep`].

The per-pattern caches (sample range, skip table, structural digest) are
computed eagerly when the pattern is created and are kept up to date when
the pattern tree changes, so every matching and measuring operation takes
`&self` and never mutates the pool.
*/

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

#[cfg(feature = "logging")]
use log::*;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use smallvec::SmallVec;

use crate::bits::{BitRange, INF};
use crate::errors::{BuildError, ConsistencyError};
use crate::filetype::DataFormat;
use crate::skips::{ByteSet, SkipTable, Starts};

pub use kinds::{
    Anchor, Domain, Kind, Literal, LiteralFlagSet, LiteralFlags, Repeat, Subs,
};
pub use matchers::Matcher;
pub use measures::Uniformity;

#[cfg(feature = "ascii-tree")]
mod ascii_tree;
mod canonical;
mod kinds;
mod lattice;
pub(crate) mod matchers;
mod matching;
mod measures;
mod random;

#[cfg(test)]
mod tests;

/// Growth allowed by default to unbounded repetitions while generating random
/// instances, in bits.
pub const DEFAULT_GROWTH_BITS: u64 = 64;

/// Identifies a pattern within a [`PatternPool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(u32);

impl PatternId {
    #[inline]
    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for PatternId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PatternId> for u32 {
    fn from(value: PatternId) -> Self {
        value.0
    }
}

impl Debug for PatternId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Descriptive information attached to a pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    /// Human readable name.
    pub name: Option<String>,
    /// Documentation.
    pub doc: Option<String>,
    /// Data format of the instances of the pattern.
    pub format: Option<DataFormat>,
    /// Physical unit of the value encoded by the pattern.
    pub unit: Option<String>,
}

/// Values derived from the pattern tree, recomputed whenever the tree below
/// the pattern changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cache {
    pub sample: BitRange,
    pub starts: Starts,
    pub skips: SkipTable,
    pub digest: u64,
}

pub(crate) struct Node {
    pub kind: Kind,
    pub meta: Meta,
    pub matcher: Option<Matcher>,
    pub supers: FxHashSet<PatternId>,
    pub roots: u32,
    pub cache: Cache,
    /// `true` if the node is the representative of its structure in the
    /// hash-consing table.
    pub canonical: bool,
}

/// Arena that owns a set of pattern trees.
pub struct PatternPool {
    nodes: Vec<Option<Node>>,
    live: usize,
    /// Canonical representatives indexed by structural digest.
    canonical: FxHashMap<u64, SmallVec<[PatternId; 1]>>,
    growth_bits: u64,
}

impl Default for PatternPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            live: 0,
            canonical: FxHashMap::default(),
            growth_bits: DEFAULT_GROWTH_BITS,
        }
    }

    /// Sets how many bits unbounded repetitions are allowed to grow while
    /// generating random instances.
    pub fn set_growth_bits(&mut self, bits: u64) {
        self.growth_bits = bits;
    }

    /// Number of live patterns.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the pool doesn't contain any pattern.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Returns `true` if `id` identifies a live pattern.
    pub fn contains(&self, id: PatternId) -> bool {
        self.get(id).is_some()
    }

    /// Iterator over the ids of every live pattern.
    pub fn ids(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_some())
            .map(|(idx, _)| PatternId(idx as u32))
    }

    /// The kind of a pattern.
    pub fn kind(&self, id: PatternId) -> Option<&Kind> {
        self.get(id).map(|node| &node.kind)
    }

    /// The metadata of a pattern.
    pub fn meta(&self, id: PatternId) -> Option<&Meta> {
        self.get(id).map(|node| &node.meta)
    }

    /// The matcher override of a pattern, if any.
    pub fn matcher(&self, id: PatternId) -> Option<Matcher> {
        self.get(id).and_then(|node| node.matcher)
    }

    /// Range of bit lengths of the instances of a pattern. Both bounds are
    /// inclusive, the range is undefined for patterns without instances.
    pub fn sample_range(&self, id: PatternId) -> BitRange {
        self.get(id).map_or(BitRange::undefined(), |node| node.cache.sample)
    }

    /// The skip table used while searching for a pattern.
    pub fn skip_table(&self, id: PatternId) -> SkipTable {
        self.get(id).map_or(SkipTable::none(), |node| node.cache.skips)
    }

    /// The bytes the instances of a pattern can start with.
    pub fn starts(&self, id: PatternId) -> Starts {
        self.get(id).map_or(Starts::default(), |node| node.cache.starts)
    }

    /// Digest of the pattern's structure. Structurally equal patterns have
    /// the same digest, metadata is not taken into account.
    pub fn digest(&self, id: PatternId) -> u64 {
        self.get(id).map_or(0, |node| node.cache.digest)
    }

    /// Patterns that embed `id`.
    pub fn supers(
        &self,
        id: PatternId,
    ) -> impl Iterator<Item = PatternId> + '_ {
        self.get(id).into_iter().flat_map(|node| node.supers.iter().copied())
    }

    /// Number of external holders of a pattern.
    pub fn roots(&self, id: PatternId) -> u32 {
        self.get(id).map_or(0, |node| node.roots)
    }

    #[inline]
    pub(crate) fn get(&self, id: PatternId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|node| node.as_ref())
    }

    #[inline]
    fn get_mut(&mut self, id: PatternId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|node| node.as_mut())
    }

    pub(crate) fn node(
        &self,
        id: PatternId,
    ) -> Result<&Node, ConsistencyError> {
        self.get(id).ok_or(ConsistencyError::UnknownPattern(id))
    }

    fn node_mut(
        &mut self,
        id: PatternId,
    ) -> Result<&mut Node, ConsistencyError> {
        self.get_mut(id).ok_or(ConsistencyError::UnknownPattern(id))
    }
}

/// Pattern construction.
impl PatternPool {
    /// Creates a literal pattern with the given bytes.
    pub fn lit(&mut self, bytes: &[u8]) -> Result<PatternId, BuildError> {
        self.literal(Literal::new(bytes))
    }

    /// Creates a literal that matches the given bytes regardless of the
    /// case of ASCII letters.
    pub fn lit_nocase(
        &mut self,
        bytes: &[u8],
    ) -> Result<PatternId, BuildError> {
        self.literal(Literal::new(bytes).with_flag(LiteralFlags::Nocase))
    }

    /// Creates a literal pattern.
    pub fn literal(&mut self, lit: Literal) -> Result<PatternId, BuildError> {
        if lit.is_empty() {
            return Err(BuildError::EmptyLiteral);
        }
        if !lit.is_plain() && lit.as_bytes().is_none() {
            return Err(BuildError::UnalignedLiteralFlags);
        }
        Ok(self.insert(Kind::Lit(lit))?)
    }

    /// Creates a pattern that matches any string of `bits` bits.
    pub fn any(&mut self, bits: u64) -> Result<PatternId, BuildError> {
        if bits == 0 {
            return Err(BuildError::EmptyAny);
        }
        Ok(self.insert(Kind::Any(bits))?)
    }

    /// Creates a pattern that matches a byte within `lo..=hi`.
    pub fn range(&mut self, lo: u8, hi: u8) -> Result<PatternId, BuildError> {
        if lo > hi {
            return Err(BuildError::InvalidRange { lo, hi });
        }
        Ok(self.insert(Kind::Range { lo, hi })?)
    }

    /// Creates a zero-width assertion.
    pub fn anchor(&mut self, anchor: Anchor) -> PatternId {
        let kind = Kind::Anchor(anchor);
        let cache = self.compute_cache(&kind);
        self.push_node(kind, cache)
    }

    /// Creates an alternation. Alternatives are tried in order, an
    /// alternation without alternatives never matches.
    pub fn alt(
        &mut self,
        subs: &[PatternId],
    ) -> Result<PatternId, BuildError> {
        Ok(self.insert(Kind::Alt(Subs::from_slice(subs)))?)
    }

    /// Creates a sequence.
    pub fn seq(
        &mut self,
        subs: &[PatternId],
    ) -> Result<PatternId, BuildError> {
        Ok(self.insert(Kind::Seq(Subs::from_slice(subs)))?)
    }

    /// Creates a repetition of `sub`.
    pub fn rep(
        &mut self,
        sub: PatternId,
        repeat: Repeat,
    ) -> Result<PatternId, BuildError> {
        if let Some(max) = repeat.max {
            if repeat.min > max {
                return Err(BuildError::InvalidRepetition {
                    min: repeat.min,
                    max,
                });
            }
        }
        Ok(self.insert(Kind::Rep { sub, repeat })?)
    }

    /// Tags `sub` with a domain.
    ///
    /// If `sub` is already a context with the same domain, `sub` itself is
    /// returned. If some context with the same domain already wraps `sub`,
    /// that context is returned instead of creating a new one.
    pub fn ctx(
        &mut self,
        domain: Domain,
        sub: PatternId,
    ) -> Result<PatternId, BuildError> {
        let node = self.node(sub)?;

        if matches!(node.kind, Kind::Ctx { domain: d, .. } if d == domain) {
            return Ok(sub);
        }

        let existing = node.supers.iter().copied().find(|s| {
            matches!(
                self.kind(*s),
                Some(Kind::Ctx { domain: d, sub: inner })
                    if *d == domain && *inner == sub
            )
        });

        match existing {
            Some(ctx) => Ok(ctx),
            None => Ok(self.insert(Kind::Ctx { domain, sub })?),
        }
    }

    /// Creates a pattern that matches `bytes` at the beginning of the
    /// buffer.
    pub fn prefix(&mut self, bytes: &[u8]) -> Result<PatternId, BuildError> {
        let bob = self.anchor(Anchor::Bob);
        let lit = self.lit(bytes)?;
        self.seq(&[bob, lit])
    }

    /// Creates a pattern that matches `bytes` at the end of the buffer.
    pub fn suffix(&mut self, bytes: &[u8]) -> Result<PatternId, BuildError> {
        let lit = self.lit(bytes)?;
        let eob = self.anchor(Anchor::Eob);
        self.seq(&[lit, eob])
    }

    /// Creates a pattern that matches a buffer that contains exactly
    /// `bytes`.
    pub fn exact(&mut self, bytes: &[u8]) -> Result<PatternId, BuildError> {
        let bob = self.anchor(Anchor::Bob);
        let lit = self.lit(bytes)?;
        let eob = self.anchor(Anchor::Eob);
        self.seq(&[bob, lit, eob])
    }

    /// Appends `sub` to an alternation or a sequence.
    pub fn push_sub(
        &mut self,
        multi: PatternId,
        sub: PatternId,
    ) -> Result<(), ConsistencyError> {
        self.node(sub)?;

        if !self.node(multi)?.kind.is_multi() {
            return Err(ConsistencyError::NotMulti(multi));
        }

        if sub == multi || self.reaches(sub, multi) {
            return Err(ConsistencyError::Cycle { multi, sub });
        }

        if let Kind::Alt(subs) | Kind::Seq(subs) =
            &mut self.node_mut(multi)?.kind
        {
            subs.push(sub);
        }

        self.node_mut(sub)?.supers.insert(multi);
        self.refresh(multi);

        Ok(())
    }

    /// Sets the name of a pattern.
    pub fn set_name<S: Into<String>>(
        &mut self,
        id: PatternId,
        name: S,
    ) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.meta.name = Some(name.into());
        Ok(())
    }

    /// Sets the documentation of a pattern.
    pub fn set_doc<S: Into<String>>(
        &mut self,
        id: PatternId,
        doc: S,
    ) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.meta.doc = Some(doc.into());
        Ok(())
    }

    /// Sets the data format of a pattern.
    pub fn set_format(
        &mut self,
        id: PatternId,
        format: DataFormat,
    ) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.meta.format = Some(format);
        Ok(())
    }

    /// Sets the physical unit of a pattern.
    pub fn set_unit<S: Into<String>>(
        &mut self,
        id: PatternId,
        unit: S,
    ) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.meta.unit = Some(unit.into());
        Ok(())
    }

    /// Sets or removes the matcher override of a pattern. When present, the
    /// override replaces the generic matching of the pattern. It must accept
    /// exactly the instances of the pattern.
    pub fn set_matcher(
        &mut self,
        id: PatternId,
        matcher: Option<Matcher>,
    ) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.matcher = matcher;
        Ok(())
    }

    /// Creates a node for `kind`, whose sub-patterns must exist.
    pub(crate) fn insert(
        &mut self,
        kind: Kind,
    ) -> Result<PatternId, ConsistencyError> {
        for sub in kind.subs() {
            self.node(*sub)?;
        }

        let cache = self.compute_cache(&kind);
        let subs: SmallVec<[PatternId; 4]> = kind.subs().into();
        let id = self.push_node(kind, cache);

        for sub in subs {
            if let Some(node) = self.get_mut(sub) {
                node.supers.insert(id);
            }
        }

        Ok(id)
    }

    fn push_node(&mut self, kind: Kind, cache: Cache) -> PatternId {
        let id = PatternId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            kind,
            meta: Meta::default(),
            matcher: None,
            supers: FxHashSet::default(),
            roots: 0,
            cache,
            canonical: false,
        }));
        self.live += 1;
        id
    }

    /// Returns `true` if `target` is `from` or any pattern under `from`.
    fn reaches(&self, from: PatternId, target: PatternId) -> bool {
        let mut stack = vec![from];
        let mut visited = FxHashSet::default();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.get(id) {
                stack.extend_from_slice(node.kind.subs());
            }
        }
        false
    }

    /// Recomputes the caches of `id` and, when they change, the caches of
    /// every pattern above it.
    fn refresh(&mut self, id: PatternId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(node) = self.get(id) else {
                continue;
            };
            let cache = self.compute_cache(&node.kind);
            if cache == node.cache {
                continue;
            }
            let old_digest = node.cache.digest;
            let was_canonical = node.canonical;
            if let Some(node) = self.get_mut(id) {
                node.cache = cache;
                node.canonical = false;
                pending.extend(node.supers.iter().copied());
            }
            if was_canonical {
                self.unregister_canonical(id, old_digest);
            }
        }
    }

    /// Computes the caches of a node of the given kind from the caches of
    /// its sub-patterns.
    pub(crate) fn compute_cache(&self, kind: &Kind) -> Cache {
        let sample = self.compute_sample(kind);
        let starts = self.compute_starts(kind);
        Cache {
            sample,
            starts,
            skips: SkipTable::from_starts(&starts),
            digest: self.compute_digest(kind),
        }
    }

    fn sub_cache(&self, id: PatternId) -> Cache {
        self.get(id).map_or(
            Cache {
                sample: BitRange::undefined(),
                starts: Starts::default(),
                skips: SkipTable::none(),
                digest: 0,
            },
            |node| node.cache,
        )
    }

    fn compute_sample(&self, kind: &Kind) -> BitRange {
        match kind {
            Kind::Lit(lit) => BitRange::fixed(lit.len()),
            Kind::Any(bits) => BitRange::fixed(*bits),
            Kind::Range { .. } => BitRange::fixed(8),
            Kind::Anchor(_) => BitRange::fixed(0),
            Kind::Alt(subs) => {
                let mut range = BitRange::undefined();
                for sub in subs {
                    range.include(&self.sub_cache(*sub).sample);
                }
                range
            }
            Kind::Seq(subs) => {
                subs.iter().fold(BitRange::fixed(0), |acc, sub| {
                    acc.concat(&self.sub_cache(*sub).sample)
                })
            }
            Kind::Rep { sub, repeat } => {
                let sub = self.sub_cache(*sub).sample;
                if !sub.is_defined() {
                    return if repeat.min == 0 {
                        BitRange::fixed(0)
                    } else {
                        BitRange::undefined()
                    };
                }
                let high = match repeat.max {
                    Some(max) => sub.high.saturating_mul(max),
                    None if sub.high == 0 => 0,
                    None => INF,
                };
                BitRange::new(sub.low.saturating_mul(repeat.min), high)
            }
            Kind::Ctx { sub, .. } => self.sub_cache(*sub).sample,
        }
    }

    fn compute_starts(&self, kind: &Kind) -> Starts {
        match kind {
            Kind::Lit(lit) => lit.starts(),
            Kind::Any(_) => Starts::any(),
            Kind::Range { lo, hi } => Starts {
                bytes: ByteSet::from_range(*lo..=*hi),
                nullable: false,
            },
            Kind::Anchor(_) => Starts::nullable(),
            Kind::Alt(subs) => {
                let mut starts = Starts::default();
                for sub in subs {
                    starts.union(&self.sub_cache(*sub).starts);
                }
                starts
            }
            Kind::Seq(subs) => {
                let mut starts = Starts::nullable();
                for sub in subs {
                    let sub = self.sub_cache(*sub).starts;
                    starts.bytes.union(&sub.bytes);
                    if !sub.nullable {
                        starts.nullable = false;
                        break;
                    }
                }
                starts
            }
            Kind::Rep { sub, repeat } => {
                let mut starts = self.sub_cache(*sub).starts;
                starts.nullable |= repeat.min == 0;
                starts
            }
            Kind::Ctx { sub, .. } => self.sub_cache(*sub).starts,
        }
    }

    /// Digest of a node of the given kind. Sub-patterns contribute with
    /// their own digests, so structurally equal trees have equal digests
    /// regardless of node identity.
    pub(crate) fn compute_digest(&self, kind: &Kind) -> u64 {
        let mut hasher = FxHasher::default();
        std::mem::discriminant(kind).hash(&mut hasher);
        match kind {
            Kind::Lit(lit) => lit.hash(&mut hasher),
            Kind::Any(bits) => bits.hash(&mut hasher),
            Kind::Range { lo, hi } => (lo, hi).hash(&mut hasher),
            Kind::Anchor(anchor) => anchor.hash(&mut hasher),
            Kind::Alt(subs) | Kind::Seq(subs) => {
                subs.len().hash(&mut hasher);
                for sub in subs {
                    self.sub_cache(*sub).digest.hash(&mut hasher);
                }
            }
            Kind::Rep { sub, repeat } => {
                repeat.hash(&mut hasher);
                self.sub_cache(*sub).digest.hash(&mut hasher);
            }
            Kind::Ctx { domain, sub } => {
                domain.hash(&mut hasher);
                self.sub_cache(*sub).digest.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Lifetime management.
impl PatternPool {
    /// Registers an external holder of `id`. A retained pattern, and all the
    /// patterns under it, are never destroyed.
    pub fn retain(&mut self, id: PatternId) -> Result<(), ConsistencyError> {
        self.node_mut(id)?.roots += 1;
        Ok(())
    }

    /// Removes an external holder of `id`. The pattern is destroyed if it
    /// isn't retained anymore and no other pattern embeds it.
    pub fn release(&mut self, id: PatternId) -> Result<(), ConsistencyError> {
        let node = self.node_mut(id)?;
        if node.roots == 0 {
            return Err(ConsistencyError::RootUnderflow(id));
        }
        node.roots -= 1;
        if node.roots == 0 && node.supers.is_empty() {
            self.destroy(id);
        }
        Ok(())
    }

    /// Destroys every pattern that is neither retained nor embedded in
    /// another pattern. Returns the number of destroyed patterns.
    pub fn sweep(&mut self) -> usize {
        let before = self.live;
        let orphans: Vec<PatternId> = self
            .ids()
            .filter(|id| {
                self.get(*id).is_some_and(|node| {
                    node.roots == 0 && node.supers.is_empty()
                })
            })
            .collect();
        for id in orphans {
            self.destroy(id);
        }
        #[cfg(feature = "logging")]
        if before > self.live {
            debug!("swept {} patterns", before - self.live);
        }
        before - self.live
    }

    /// Destroys `id` and every pattern under it that becomes orphan.
    fn destroy(&mut self, id: PatternId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(node) =
                self.nodes.get_mut(id.index()).and_then(Option::take)
            else {
                continue;
            };
            self.live -= 1;
            if node.canonical {
                self.unregister_canonical(id, node.cache.digest);
            }
            for sub in node.kind.subs() {
                if let Some(child) = self.get_mut(*sub) {
                    child.supers.remove(&id);
                    if child.supers.is_empty() && child.roots == 0 {
                        pending.push(*sub);
                    }
                }
            }
        }
    }

    /// Replaces every occurrence of `old` among the sub-patterns of the
    /// supers of `old` with `new`.
    fn migrate_supers(&mut self, old: PatternId, new: PatternId) {
        let supers: Vec<PatternId> = match self.get_mut(old) {
            Some(node) => node.supers.drain().collect(),
            None => return,
        };
        for s in supers {
            if let Some(node) = self.get_mut(s) {
                for sub in node.kind.subs_mut() {
                    if *sub == old {
                        *sub = new;
                    }
                }
            }
            if let Some(node) = self.get_mut(new) {
                node.supers.insert(s);
            }
            self.refresh(s);
        }
    }

    fn unregister_canonical(&mut self, id: PatternId, digest: u64) {
        if let Some(ids) = self.canonical.get_mut(&digest) {
            ids.retain(|c| *c != id);
            if ids.is_empty() {
                self.canonical.remove(&digest);
            }
        }
    }
}
