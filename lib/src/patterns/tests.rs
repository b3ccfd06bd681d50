use bitvec::prelude::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bits::{BitRange, INF};
use crate::errors::{ConsistencyError, SelfCheckFailure};
use crate::hit::Hit;
use crate::mode::MatchMode;
use crate::patterns::{
    Anchor, Domain, Kind, Literal, PatternId, PatternPool, Repeat, Uniformity,
};

fn partial(pool: &PatternPool, id: PatternId, data: &[u8]) -> Option<Hit> {
    pool.match_in(id, data, BitRange::full(), MatchMode::Partial)
}

/// Anchored match at each byte offset, the first one that succeeds.
fn naive_search(
    pool: &PatternPool,
    id: PatternId,
    data: &[u8],
) -> Option<Hit> {
    (0..=data.len() as u64).find_map(|at| pool.match_at(id, data, at * 8))
}

#[test]
fn literal() {
    let mut pool = PatternPool::new();
    let gzip = pool.lit(b"\x1f\x8b").unwrap();

    assert_eq!(
        pool.match_at(gzip, b"\x1f\x8b\x00\x01", 0),
        Some(Hit::new(0, 16))
    );
    assert_eq!(pool.match_at(gzip, b"\x1f\x00", 0), None);
    assert_eq!(pool.match_at(gzip, b"\x00\x1f\x8b", 0), None);
    assert_eq!(partial(&pool, gzip, b"\x00\x1f\x8b"), Some(Hit::new(8, 16)));
    assert_eq!(partial(&pool, gzip, b"\x1f"), None);
    assert_eq!(pool.sample_range(gzip), BitRange::fixed(16));
}

#[test]
fn unaligned_literal() {
    let mut pool = PatternPool::new();
    let nibble = pool.literal(Literal::from_value(0b1011, 4)).unwrap();

    // 0xb0 begins with 0b1011.
    let data = [0x00, 0xb0];

    assert_eq!(pool.match_at(nibble, &data, 8), Some(Hit::new(8, 4)));
    assert_eq!(partial(&pool, nibble, &data), Some(Hit::new(8, 4)));

    // Searching from an unaligned offset tries the same bit position of
    // every following byte.
    assert_eq!(
        pool.match_in(
            nibble,
            &[0x0b, 0x00],
            BitRange::new(4, INF),
            MatchMode::Partial
        ),
        Some(Hit::new(4, 4))
    );
    assert_eq!(
        pool.match_in(
            nibble,
            &[0x00, 0xb0],
            BitRange::new(4, INF),
            MatchMode::Partial
        ),
        None
    );
}

#[test]
fn literal_errors() {
    let mut pool = PatternPool::new();
    assert!(pool.lit(b"").is_err());
    assert!(pool.any(0).is_err());
    assert!(pool.range(b'z', b'a').is_err());
    assert!(pool
        .literal(
            Literal::from_value(1, 3)
                .with_flag(crate::patterns::LiteralFlags::Nocase)
        )
        .is_err());
    let a = pool.lit(b"a").unwrap();
    assert!(pool.rep(a, Repeat::between(3, 2)).is_err());
}

#[test]
fn nocase_literal() {
    let mut pool = PatternPool::new();
    let make = pool.lit_nocase(b"makefile").unwrap();
    assert_eq!(pool.match_at(make, b"Makefile", 0), Some(Hit::new(0, 64)));
    assert_eq!(partial(&pool, make, b"GNUMAKEFILE"), Some(Hit::new(24, 64)));
    assert_eq!(pool.match_at(make, b"makefil", 0), None);
}

#[test]
fn alternation_takes_first_match() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let ab = pool.lit(b"ab").unwrap();
    let alt = pool.alt(&[a, ab]).unwrap();

    assert_eq!(pool.match_at(alt, b"ab", 0), Some(Hit::new(0, 8)));
    assert_eq!(
        pool.match_in(alt, b"ab", BitRange::new(0, 16), MatchMode::Full),
        None
    );
    assert_eq!(pool.sample_range(alt), BitRange::new(8, 16));
}

#[test]
fn empty_alternation() {
    let mut pool = PatternPool::new();
    let never = pool.alt(&[]).unwrap();

    assert!(!pool.sample_range(never).is_defined());
    assert_eq!(pool.match_at(never, b"abc", 0), None);
    assert_eq!(partial(&pool, never, b"abc"), None);
    assert_eq!(pool.complexity(never, BitRange::full()), 0);

    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(pool.rand(never, BitRange::full(), &mut rng), None);

    // Repeating a pattern without instances zero times is still possible.
    let rep = pool.rep(never, Repeat::at_least(0)).unwrap();
    assert_eq!(pool.sample_range(rep), BitRange::fixed(0));
    assert_eq!(pool.match_at(rep, b"abc", 0), Some(Hit::empty_at(0)));
}

#[test]
fn sequences_and_anchors() {
    let mut pool = PatternPool::new();

    let exact = pool.exact(b"abc").unwrap();
    assert_eq!(pool.match_at(exact, b"abc", 0), Some(Hit::new(0, 24)));
    assert_eq!(pool.match_at(exact, b"abcd", 0), None);
    assert_eq!(partial(&pool, exact, b"xabc"), None);

    let prefix = pool.prefix(b"ab").unwrap();
    assert_eq!(partial(&pool, prefix, b"abcd"), Some(Hit::new(0, 16)));
    assert_eq!(partial(&pool, prefix, b"xab"), None);

    let suffix = pool.suffix(b"cd").unwrap();
    assert_eq!(partial(&pool, suffix, b"abcd"), Some(Hit::new(16, 16)));
    assert_eq!(partial(&pool, suffix, b"abcdx"), None);

    let lit = pool.lit(b"ab").unwrap();
    let any = pool.any(4).unwrap();
    let seq = pool.seq(&[lit, any]).unwrap();
    assert_eq!(pool.sample_range(seq), BitRange::fixed(20));
    assert_eq!(pool.match_at(seq, b"ab\xff", 0), Some(Hit::new(0, 20)));
    assert_eq!(pool.match_at(seq, b"ab", 0), None);
}

#[test]
fn anchors_hold_relative_to_the_buffer() {
    let mut pool = PatternPool::new();
    let prefix = pool.prefix(b"ab").unwrap();

    // The region starts at byte 1, but the buffer starts at byte 0.
    assert_eq!(
        pool.match_in(
            prefix,
            b"xab",
            BitRange::new(8, INF),
            MatchMode::Anchored
        ),
        None
    );

    let bol = pool.anchor(Anchor::Bol);
    let lit = pool.lit(b"b").unwrap();
    let line = pool.seq(&[bol, lit]).unwrap();
    assert_eq!(partial(&pool, line, b"ab\nb"), Some(Hit::new(24, 8)));
}

#[test]
fn repetitions_are_greedy() {
    let mut pool = PatternPool::new();
    let letter = pool.range(b'a', b'z').unwrap();
    let rep = pool.rep(letter, Repeat::between(2, 3)).unwrap();

    assert_eq!(pool.sample_range(rep), BitRange::new(16, 24));
    assert_eq!(pool.match_at(rep, b"abcd", 0), Some(Hit::new(0, 24)));
    assert_eq!(pool.match_at(rep, b"ab1", 0), Some(Hit::new(0, 16)));
    assert_eq!(pool.match_at(rep, b"a1", 0), None);

    let x = pool.lit(b"x").unwrap();
    let star = pool.rep(x, Repeat::at_least(0)).unwrap();
    assert_eq!(pool.sample_range(star), BitRange::new(0, INF));
    assert_eq!(pool.match_at(star, b"yy", 0), Some(Hit::empty_at(0)));
    assert_eq!(pool.match_at(star, b"xxy", 0), Some(Hit::new(0, 16)));
}

#[test]
fn regions() {
    let mut pool = PatternPool::new();
    let lit = pool.lit(b"ab").unwrap();

    assert_eq!(
        pool.match_in(lit, b"ab", BitRange::new(24, INF), MatchMode::Partial),
        None
    );
    assert_eq!(
        pool.match_in(lit, b"ab", BitRange::undefined(), MatchMode::Partial),
        None
    );
    // The match can't go past the end of the region.
    assert_eq!(
        pool.match_in(lit, b"xab", BitRange::new(0, 16), MatchMode::Partial),
        None
    );
    assert_eq!(
        pool.match_in(lit, b"xab", BitRange::new(8, 24), MatchMode::Full),
        Some(Hit::new(8, 16))
    );
}

#[test]
fn empty_regions() {
    let mut pool = PatternPool::new();
    let ab = pool.lit(b"ab").unwrap();
    let byte = pool.any(8).unwrap();
    let a = pool.lit(b"a").unwrap();
    let maybe = pool.rep(a, Repeat::at_least(0)).unwrap();
    let nothing = pool.seq(&[]).unwrap();
    let bob = pool.anchor(Anchor::Bob);
    let eob = pool.anchor(Anchor::Eob);

    for mode in [MatchMode::Anchored, MatchMode::Partial, MatchMode::Full] {
        for id in [ab, byte] {
            assert_eq!(
                pool.match_in(id, b"abab", BitRange::empty_at(8), mode),
                None
            );
            assert_eq!(pool.match_in(id, b"", BitRange::full(), mode), None);
        }

        for id in [maybe, nothing] {
            assert_eq!(
                pool.match_in(id, b"abab", BitRange::empty_at(8), mode),
                Some(Hit::new(8, 0))
            );
            assert_eq!(
                pool.match_in(id, b"", BitRange::full(), mode),
                Some(Hit::new(0, 0))
            );
        }

        for id in [bob, eob] {
            assert_eq!(
                pool.match_in(id, b"", BitRange::full(), mode),
                Some(Hit::new(0, 0))
            );
        }
        assert_eq!(
            pool.match_in(eob, b"abab", BitRange::empty_at(32), mode),
            Some(Hit::new(32, 0))
        );
    }
}

#[test]
fn contexts() {
    let mut pool = PatternPool::new();
    let lit = pool.lit(b"a").unwrap();
    let ctx = pool.ctx(Domain::FileName, lit).unwrap();

    assert_eq!(pool.match_at(ctx, b"a", 0), Some(Hit::new(0, 8)));
    assert_eq!(pool.sample_range(ctx), pool.sample_range(lit));

    // Wrapping twice with the same domain doesn't create new patterns.
    assert_eq!(pool.ctx(Domain::FileName, ctx).unwrap(), ctx);
    assert_eq!(pool.ctx(Domain::FileName, lit).unwrap(), ctx);
    assert_ne!(pool.ctx(Domain::FileContents, lit).unwrap(), ctx);
}

#[test]
fn skip_tables() {
    let mut pool = PatternPool::new();

    let lit = pool.lit(b"ab").unwrap();
    let skips = pool.skip_table(lit);
    assert!(!skips.can_skip(b'a'));
    assert!(skips.can_skip(b'b'));
    assert_eq!(skips.len(), 255);

    // Zero-width patterns at the beginning don't constrain the first byte.
    let bob = pool.anchor(Anchor::Bob);
    let prefix = pool.seq(&[bob, lit]).unwrap();
    assert_eq!(pool.skip_table(prefix), skips);

    let x = pool.lit(b"x").unwrap();
    let star = pool.rep(x, Repeat::at_least(0)).unwrap();
    let alt = pool.alt(&[lit, star]).unwrap();
    assert!(pool.skip_table(alt).is_trivial());

    let range = pool.range(b'0', b'9').unwrap();
    assert_eq!(pool.skip_table(range).len(), 246);
}

#[test]
fn matchers() {
    let mut pool = PatternPool::new();

    let digit = pool.digit().unwrap();
    assert!(pool.matcher(digit).is_some());
    assert_eq!(partial(&pool, digit, b"ab1"), Some(Hit::new(16, 8)));

    let ident = pool.c_identifier().unwrap();
    assert_eq!(partial(&pool, ident, b"1 foo_2 "), Some(Hit::new(16, 40)));

    let hex = pool.hex_digit().unwrap();
    assert_eq!(pool.match_at(hex, b"F", 0), Some(Hit::new(0, 8)));
    assert_eq!(pool.match_at(hex, b"g", 0), None);

    let letter = pool.letter().unwrap();
    assert_eq!(pool.match_at(letter, b"Q", 0), Some(Hit::new(0, 8)));

    let range = pool.range(b'0', b'9').unwrap();
    let ascii = pool.range(0, 0x7f).unwrap();
    let other = pool.range(1, 0x7f).unwrap();
    let seq = pool.seq(&[range, ascii, other]).unwrap();
    assert_eq!(pool.auto_detect_matchers(seq), 2);
    assert!(pool.matcher(range).is_some());
    assert!(pool.matcher(other).is_none());
    assert_eq!(pool.match_at(seq, b"1\x7f\x01", 0), Some(Hit::new(0, 24)));
    assert_eq!(pool.match_at(seq, b"1\x80\x01", 0), None);
}

#[test]
fn metadata() {
    let mut pool = PatternPool::new();
    let lit = pool.lit(b"RIFF").unwrap();
    pool.set_name(lit, "riff").unwrap();
    pool.set_doc(lit, "Resource Interchange File Format").unwrap();
    pool.set_unit(lit, "bytes").unwrap();

    let meta = pool.meta(lit).unwrap();
    assert_eq!(meta.name.as_deref(), Some("riff"));
    assert_eq!(meta.unit.as_deref(), Some("bytes"));
    assert_eq!(meta.format, None);
}

#[test]
fn release_destroys_orphans() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let seq = pool.seq(&[a]).unwrap();

    pool.retain(seq).unwrap();
    assert_eq!(pool.roots(seq), 1);
    assert_eq!(pool.supers(a).collect::<Vec<_>>(), vec![seq]);

    pool.release(seq).unwrap();

    assert!(pool.is_empty());
    assert!(!pool.contains(a));
    assert_eq!(pool.kind(seq), None);
    assert_eq!(pool.match_at(seq, b"a", 0), None);
    assert_eq!(
        pool.retain(seq),
        Err(ConsistencyError::UnknownPattern(seq))
    );
}

#[test]
fn release_underflow() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    assert_eq!(pool.release(a), Err(ConsistencyError::RootUnderflow(a)));
    assert!(pool.contains(a));
}

#[test]
fn shared_sub_patterns() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let first = pool.seq(&[a]).unwrap();
    let second = pool.seq(&[a]).unwrap();

    pool.retain(first).unwrap();
    pool.retain(second).unwrap();
    pool.release(first).unwrap();

    assert!(!pool.contains(first));
    assert!(pool.contains(a));
    assert_eq!(pool.supers(a).collect::<Vec<_>>(), vec![second]);
    assert_eq!(pool.len(), 2);
}

#[test]
fn sweep() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let b = pool.lit(b"b").unwrap();
    let _seq = pool.seq(&[a]).unwrap();
    let kept = pool.lit(b"c").unwrap();
    pool.retain(kept).unwrap();

    assert_eq!(pool.sweep(), 3);
    assert!(!pool.contains(b));
    assert_eq!(pool.ids().collect::<Vec<_>>(), vec![kept]);
    assert_eq!(pool.sweep(), 0);
}

#[test]
fn push_sub() {
    let mut pool = PatternPool::new();
    let alt = pool.alt(&[]).unwrap();
    let seq = pool.seq(&[alt]).unwrap();
    let a = pool.lit(b"a").unwrap();

    assert!(!pool.sample_range(seq).is_defined());

    pool.push_sub(alt, a).unwrap();

    // Caches above the modified pattern are updated too.
    assert_eq!(pool.sample_range(alt), BitRange::fixed(8));
    assert_eq!(pool.sample_range(seq), BitRange::fixed(8));
    assert_eq!(pool.match_at(seq, b"a", 0), Some(Hit::new(0, 8)));

    assert_eq!(
        pool.push_sub(alt, seq),
        Err(ConsistencyError::Cycle { multi: alt, sub: seq })
    );
    assert_eq!(
        pool.push_sub(alt, alt),
        Err(ConsistencyError::Cycle { multi: alt, sub: alt })
    );
    assert_eq!(pool.push_sub(a, alt), Err(ConsistencyError::NotMulti(a)));
}

#[test]
fn structural_equality() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"ab").unwrap();
    let b = pool.lit(b"ab").unwrap();
    let c = pool.lit(b"ac").unwrap();
    pool.set_name(b, "other").unwrap();

    assert!(pool.structurally_eq(a, b));
    assert_eq!(pool.digest(a), pool.digest(b));
    assert!(!pool.structurally_eq(a, c));

    let x = pool.seq(&[a, c]).unwrap();
    let y = pool.seq(&[b, c]).unwrap();
    let z = pool.seq(&[c, a]).unwrap();
    assert!(pool.structurally_eq(x, y));
    assert!(!pool.structurally_eq(x, z));
}

#[test]
fn canonical_literals_are_fused() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let b = pool.lit(b"b").unwrap();
    let seq = pool.seq(&[a, b]).unwrap();

    let canonical = pool.canonicalize(seq).unwrap();

    assert_eq!(
        pool.kind(canonical),
        Some(&Kind::Lit(Literal::new(b"ab")))
    );
    assert_eq!(pool.canonicalize(canonical).unwrap(), canonical);

    // A structurally equal pattern has the same representative.
    let ab = pool.lit(b"ab").unwrap();
    assert_eq!(pool.canonicalize(ab).unwrap(), canonical);

    // The input pattern is untouched.
    assert_eq!(pool.kind(seq).map(|k| k.subs().to_vec()), Some(vec![a, b]));
}

#[test]
fn canonical_alternations() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let b = pool.lit(b"b").unwrap();
    let c = pool.lit(b"c").unwrap();

    let abc = pool.alt(&[a, b, c]).unwrap();
    let canonical = pool.canonicalize(abc).unwrap();
    assert_eq!(
        pool.kind(canonical),
        Some(&Kind::Range { lo: b'a', hi: b'c' })
    );

    let ac = pool.alt(&[a, c]).unwrap();
    let canonical = pool.canonicalize(ac).unwrap();
    assert!(matches!(
        pool.kind(canonical),
        Some(Kind::Alt(subs)) if subs.len() == 2
    ));

    let xx = pool.lit(b"xx").unwrap();
    let yy = pool.lit(b"yy").unwrap();
    let zz = pool.lit(b"zz").unwrap();
    let inner = pool.alt(&[xx, yy]).unwrap();
    let outer = pool.alt(&[inner, zz]).unwrap();
    let canonical = pool.canonicalize(outer).unwrap();
    assert_eq!(
        pool.kind(canonical).map(|k| k.subs().len()),
        Some(3)
    );

    // Duplicate alternatives collapse.
    let again = pool.lit(b"a").unwrap();
    let dup = pool.alt(&[a, again]).unwrap();
    assert_eq!(pool.canonicalize(dup).unwrap(), pool.canonicalize(a).unwrap());
}

#[test]
fn canonical_repetitions_and_ranges() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();

    let once = pool.rep(a, Repeat::exactly(1)).unwrap();
    let lit = pool.canonicalize(a).unwrap();
    assert_eq!(pool.canonicalize(once).unwrap(), lit);

    let never = pool.rep(a, Repeat::between(0, 0)).unwrap();
    let canonical = pool.canonicalize(never).unwrap();
    assert_eq!(pool.kind(canonical), Some(&Kind::empty()));
    assert_eq!(pool.sample_range(canonical), BitRange::fixed(0));

    let byte = pool.any(8).unwrap();
    let word = pool.rep(byte, Repeat::exactly(4)).unwrap();
    let canonical = pool.canonicalize(word).unwrap();
    assert_eq!(pool.kind(canonical), Some(&Kind::Any(32)));

    let full = pool.range(0x00, 0xff).unwrap();
    let canonical = pool.canonicalize(full).unwrap();
    assert_eq!(pool.kind(canonical), Some(&Kind::Any(8)));
}

#[test]
fn canonical_contexts_collapse() {
    let mut pool = PatternPool::new();
    let lit = pool.lit(b"a").unwrap();
    let inner = pool.ctx(Domain::FileName, lit).unwrap();
    let wrapper = pool.seq(&[inner]).unwrap();
    let outer = pool.ctx(Domain::FileName, wrapper).unwrap();

    assert_eq!(pool.canonicalize(outer).unwrap(), inner);

    let contents = pool.ctx(Domain::FileContents, wrapper).unwrap();
    let canonical = pool.canonicalize(contents).unwrap();
    assert_eq!(
        pool.kind(canonical),
        Some(&Kind::Ctx { domain: Domain::FileContents, sub: inner })
    );
}

#[test]
fn mutating_canonicalize() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let b = pool.lit(b"b").unwrap();
    let c = pool.lit(b"c").unwrap();
    let ab = pool.seq(&[a, b]).unwrap();
    let abc = pool.seq(&[ab, c]).unwrap();
    pool.retain(abc).unwrap();

    let canonical = pool.mutating_canonicalize(ab).unwrap();

    assert!(!pool.contains(ab));
    assert_eq!(
        pool.kind(abc).map(|k| k.subs().to_vec()),
        Some(vec![canonical, c])
    );
    assert_eq!(pool.supers(canonical).collect::<Vec<_>>(), vec![abc]);
    assert_eq!(pool.match_at(abc, b"abc", 0), Some(Hit::new(0, 24)));

    // Retained patterns survive until they are released.
    let d = pool.lit(b"d").unwrap();
    let e = pool.lit(b"e").unwrap();
    let de = pool.seq(&[d, e]).unwrap();
    let wrapper = pool.seq(&[de, c]).unwrap();
    pool.retain(wrapper).unwrap();
    pool.retain(de).unwrap();
    pool.mutating_canonicalize(de).unwrap();
    assert!(pool.contains(de));
    assert_eq!(pool.supers(de).count(), 0);
}

#[test]
fn complexity() {
    let mut pool = PatternPool::new();
    let full = BitRange::full();

    let lit = pool.lit(b"ab").unwrap();
    assert_eq!(pool.complexity(lit, full), 1);
    assert_eq!(pool.complexity(lit, BitRange::new(0, 8)), 0);

    let letter = pool.range(b'a', b'z').unwrap();
    assert_eq!(pool.complexity(letter, full), 26);

    let nibble = pool.any(4).unwrap();
    assert_eq!(pool.complexity(nibble, full), 16);

    let nocase = pool.lit_nocase(b"ab").unwrap();
    assert_eq!(pool.complexity(nocase, full), 4);

    let d0 = pool.range(b'0', b'9').unwrap();
    let d1 = pool.range(b'0', b'9').unwrap();
    let pair = pool.seq(&[d0, d1]).unwrap();
    assert_eq!(pool.complexity(pair, full), 100);

    let digits = pool.rep(d0, Repeat::between(1, 2)).unwrap();
    assert_eq!(pool.complexity(digits, full), 110);

    let a = pool.lit(b"a").unwrap();
    let star = pool.rep(a, Repeat::at_least(0)).unwrap();
    assert_eq!(pool.complexity(star, full), u64::MAX);
    assert_eq!(pool.complexity(star, BitRange::new(0, 24)), 4);
    assert_eq!(pool.complexity(star, BitRange::new(8, 16)), 2);

    let word = pool.any(64).unwrap();
    assert_eq!(pool.complexity(word, full), u64::MAX);

    let b = pool.lit(b"b").unwrap();
    let alt = pool.alt(&[a, b]).unwrap();
    assert_eq!(pool.complexity(alt, full), 2);
}

#[test]
fn uniformity_and_constants() {
    let mut pool = PatternPool::new();

    let a = pool.lit(b"a").unwrap();
    let bob = pool.anchor(Anchor::Bob);
    let b = pool.lit(b"b").unwrap();
    let seq = pool.seq(&[a, bob, b]).unwrap();
    assert_eq!(pool.uniformity(seq), Uniformity::Contents);
    assert_eq!(pool.constant(seq), Some(BitVec::from_slice(&b"ab"[..])));

    let five = pool.range(5, 5).unwrap();
    assert_eq!(pool.constant(five), Some(BitVec::from_slice(&[5_u8][..])));

    // Flags that don't apply to any byte keep the literal constant.
    let digits = pool.lit_nocase(b"12").unwrap();
    assert!(pool.is_constant(digits));

    let letter = pool.range(b'a', b'z').unwrap();
    assert_eq!(pool.uniformity(letter), Uniformity::Size);
    assert_eq!(pool.constant(letter), None);

    let bb = pool.lit(b"bb").unwrap();
    let alt = pool.alt(&[a, bb]).unwrap();
    assert_eq!(pool.uniformity(alt), Uniformity::None);

    let never = pool.alt(&[]).unwrap();
    assert_eq!(pool.uniformity(never), Uniformity::None);
}

#[test]
fn generalization() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let byte = pool.any(8).unwrap();
    let letter = pool.range(b'a', b'z').unwrap();
    let cf = pool.range(b'c', b'f').unwrap();

    assert!(pool.generalizes(byte, a));
    assert!(pool.specializes(a, byte));
    assert!(!pool.generalizes(a, byte));
    assert!(pool.generalizes(letter, cf));
    assert!(!pool.generalizes(cf, letter));
    assert!(pool.generalizes(byte, letter));
    assert!(!pool.generalizes(letter, byte));

    let b = pool.lit(b"b").unwrap();
    let ab = pool.alt(&[a, b]).unwrap();
    assert!(pool.generalizes(ab, b));
    assert!(pool.generalizes(letter, ab));
    assert!(!pool.generalizes(cf, ab));

    let word = pool.rep(letter, Repeat::at_least(1)).unwrap();
    let abc = pool.lit(b"abc").unwrap();
    assert!(pool.generalizes(word, abc));
    assert!(pool.generalizes(word, letter));

    let never = pool.alt(&[]).unwrap();
    assert!(pool.generalizes(a, never));
    assert!(!pool.generalizes(never, a));
}

#[test]
fn generalization_of_contexts() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let byte = pool.any(8).unwrap();
    let name = pool.ctx(Domain::FileName, a).unwrap();
    let contents = pool.ctx(Domain::FileContents, a).unwrap();
    let any_name = pool.ctx(Domain::FileName, byte).unwrap();

    assert!(!pool.generalizes(name, contents));
    assert!(pool.generalizes(any_name, name));
    assert!(pool.generalizes(any_name, a));
    assert!(pool.generalizes(byte, name));
}

#[test]
fn generalization_follows_matching() {
    let mut pool = PatternPool::new();

    // Anchors depend on where the pattern is in the buffer.
    let prefix = pool.prefix(b"x").unwrap();
    let x = pool.lit(b"x").unwrap();
    assert_eq!(partial(&pool, x, b"yx"), Some(Hit::new(8, 8)));
    assert_eq!(partial(&pool, prefix, b"yx"), None);
    assert!(!pool.generalizes(prefix, x));
    assert!(pool.generalizes(x, prefix));
    assert_eq!(pool.prune_specializations(&[prefix, x]), vec![x]);

    let bob = pool.anchor(Anchor::Bob);
    let byte = pool.any(8).unwrap();
    let first_byte = pool.seq(&[bob, byte]).unwrap();
    assert!(pool.generalizes(first_byte, prefix));

    // Repetitions never give back what they consumed.
    let letter = pool.range(b'a', b'z').unwrap();
    let letters = pool.rep(letter, Repeat::at_least(1)).unwrap();
    let a = pool.lit(b"a").unwrap();
    let greedy = pool.seq(&[letters, a]).unwrap();
    let simple = pool.seq(&[letter, a]).unwrap();
    assert_eq!(pool.match_at(simple, b"ba", 0), Some(Hit::new(0, 16)));
    assert_eq!(pool.match_at(greedy, b"ba", 0), None);
    assert!(!pool.generalizes(greedy, simple));
    assert_eq!(
        pool.prune_specializations(&[greedy, simple]),
        vec![greedy, simple]
    );

    let any_then_a = pool.seq(&[byte, a]).unwrap();
    assert!(pool.generalizes(any_then_a, simple));

    let ab = pool.lit(b"ab").unwrap();
    let short_first = pool.alt(&[a, ab]).unwrap();
    let pairs = pool.rep(short_first, Repeat::exactly(2)).unwrap();
    let abs = pool.rep(ab, Repeat::exactly(2)).unwrap();
    assert_eq!(pool.match_at(abs, b"abab", 0), Some(Hit::new(0, 32)));
    assert_eq!(pool.match_at(pairs, b"abab", 0), None);
    assert!(!pool.generalizes(pairs, abs));
}

#[test]
fn prune_specializations() {
    let mut pool = PatternPool::new();
    let a = pool.lit(b"a").unwrap();
    let byte = pool.any(8).unwrap();
    let letter = pool.range(b'a', b'z').unwrap();

    assert_eq!(pool.prune_specializations(&[a, byte, letter]), vec![byte]);
    assert_eq!(pool.prune_specializations(&[a, letter]), vec![letter]);

    // Of two equivalent patterns the first one is kept.
    let again = pool.lit(b"a").unwrap();
    assert_eq!(pool.prune_specializations(&[again, a]), vec![again]);

    let b = pool.lit(b"b").unwrap();
    assert_eq!(pool.prune_specializations(&[b, a]), vec![b, a]);
}

#[test]
fn random_instances() {
    let mut pool = PatternPool::new();
    let mut rng = StdRng::seed_from_u64(7);

    let ab = pool.lit(b"ab").unwrap();
    let rep = pool.rep(ab, Repeat::between(2, 3)).unwrap();

    for _ in 0..32 {
        let instance =
            pool.rand(rep, BitRange::new(32, 48), &mut rng).unwrap();
        assert!(instance.len() == 32 || instance.len() == 48);
        let bytes = instance.into_vec();
        assert!(pool.match_at(rep, &bytes, 0).is_some());
    }

    assert_eq!(pool.rand(ab, BitRange::new(0, 8), &mut rng), None);

    // Without growth, unbounded repetitions produce their minimum.
    let a = pool.lit(b"a").unwrap();
    let plus = pool.rep(a, Repeat::at_least(1)).unwrap();
    pool.set_growth_bits(0);
    let instance = pool.rand(plus, BitRange::full(), &mut rng).unwrap();
    assert_eq!(instance, BitVec::<u8, Msb0>::from_slice(&b"a"[..]));
}

#[test]
fn self_check_failure() {
    let mut pool = PatternPool::new();
    let mut rng = StdRng::seed_from_u64(42);

    // The repetition consumes the final literal, so no instance matches.
    let letter = pool.range(b'a', b'z').unwrap();
    let word = pool.rep(letter, Repeat::at_least(0)).unwrap();
    let a = pool.lit(b"a").unwrap();
    let seq = pool.seq(&[word, a]).unwrap();

    let err = pool.self_check(seq, 16, &mut rng).unwrap_err();

    assert_eq!(err.pattern, seq);
    assert_eq!(err.failure, SelfCheckFailure::NoMatch);
    assert_eq!(err.bits % 8, 0);
    assert_eq!(err.instance.last(), Some(&b'a'));
}

#[cfg(feature = "ascii-tree")]
#[test]
fn ascii_tree() {
    let mut pool = PatternPool::new();
    let ab = pool.lit(b"ab").unwrap();
    let digit = pool.digit().unwrap();
    let seq = pool.seq(&[ab, digit]).unwrap();
    pool.set_name(seq, "version").unwrap();

    let tree = pool.ascii_tree_string(seq);

    assert!(tree.contains("seq (version)"));
    assert!(tree.contains("lit \"ab\""));
    assert!(tree.contains("range 0x30-0x39 [matcher]"));
}

fn search_patterns(pool: &mut PatternPool) -> Vec<PatternId> {
    let a = pool.lit(b"a").unwrap();
    let digit = pool.range(b'0', b'9').unwrap();
    let a_digit = pool.seq(&[a, digit]).unwrap();

    let ab = pool.lit(b"ab").unwrap();
    let ba = pool.lit(b"ba").unwrap();
    let alt = pool.alt(&[ab, ba]).unwrap();

    let bow = pool.anchor(Anchor::Bow);
    let b = pool.lit(b"b").unwrap();
    let bs = pool.rep(b, Repeat::between(1, 3)).unwrap();
    let word = pool.seq(&[bow, bs]).unwrap();

    let suffix = pool.suffix(b"0x").unwrap();

    vec![a_digit, alt, word, suffix]
}

/// Builds one of a few pattern shapes out of generated parts.
fn pattern_shape(
    pool: &mut PatternPool,
    shape: usize,
    bytes: &[u8],
    (lo, hi): (u8, u8),
    repeat: Repeat,
) -> PatternId {
    let lit = pool.lit(bytes).unwrap();
    let range = pool.range(lo.min(hi), lo.max(hi)).unwrap();

    match shape {
        0 => lit,
        1 => pool.rep(range, repeat).unwrap(),
        2 => {
            let bob = pool.anchor(Anchor::Bob);
            pool.seq(&[bob, lit, range]).unwrap()
        }
        3 => pool.alt(&[lit, range]).unwrap(),
        4 => {
            let byte = pool.any(8).unwrap();
            let tail = pool.rep(byte, repeat).unwrap();
            pool.seq(&[lit, tail]).unwrap()
        }
        5 => {
            let item = pool.seq(&[range, lit]).unwrap();
            pool.rep(item, repeat).unwrap()
        }
        6 => pool.lit_nocase(bytes).unwrap(),
        _ => {
            let value = u64::from(bytes[0] >> 5);
            let head = pool.literal(Literal::from_value(value, 3)).unwrap();
            let rest = pool.any(5).unwrap();
            pool.seq(&[head, rest, lit]).unwrap()
        }
    }
}

proptest! {
    #[test]
    fn patterns_match_their_random_instances(
        seed in any::<u64>(),
        shape in 0_usize..8,
        bytes in prop::collection::vec(any::<u8>(), 1..4),
        bounds in (any::<u8>(), any::<u8>()),
        (min, extra) in (0_u64..3, 0_u64..3),
    ) {
        let mut pool = PatternPool::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let repeat = Repeat::between(min, min + extra);
        let id = pattern_shape(&mut pool, shape, &bytes, bounds, repeat);

        prop_assert_eq!(pool.self_check(id, 16, &mut rng), Ok(()));

        let skips = pool.skip_table(id);
        for _ in 0..16 {
            let instance = pool.rand(id, BitRange::full(), &mut rng);
            prop_assert!(instance.is_some());
            let mut instance = instance.unwrap();
            let bits = instance.len();
            instance.set_uninitialized(false);
            let bytes = instance.into_vec();
            prop_assert!(pool.match_at(id, &bytes, 0).is_some());
            if bits >= 8 {
                prop_assert!(!skips.can_skip(bytes[0]));
            }
        }
    }

    #[test]
    fn skipping_never_misses_a_match(
        data in prop::collection::vec(
            prop::sample::select(b"ab01x \n".to_vec()), 0..64)
    ) {
        let mut pool = PatternPool::new();
        for id in search_patterns(&mut pool) {
            prop_assert_eq!(
                partial(&pool, id, &data),
                naive_search(&pool, id, &data)
            );
        }
    }

    #[test]
    fn canonical_patterns_match_the_same(
        data in prop::collection::vec(
            prop::sample::select(b"abcd".to_vec()), 0..32)
    ) {
        let mut pool = PatternPool::new();
        let a = pool.lit(b"a").unwrap();
        let b = pool.lit(b"b").unwrap();
        let c = pool.lit(b"c").unwrap();
        let d = pool.lit(b"d").unwrap();
        let bc = pool.alt(&[b, c]).unwrap();
        let ds = pool.rep(d, Repeat::between(0, 2)).unwrap();
        let tail = pool.seq(&[b, a]).unwrap();
        let seq = pool.seq(&[a, bc, ds, tail]).unwrap();

        let canonical = pool.canonicalize(seq).unwrap();
        prop_assert_ne!(canonical, seq);

        prop_assert_eq!(
            partial(&pool, canonical, &data),
            partial(&pool, seq, &data)
        );
        prop_assert_eq!(
            pool.match_at(canonical, &data, 0),
            pool.match_at(seq, &data, 0)
        );
    }
}
