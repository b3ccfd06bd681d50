/*! A bit-precision pattern matching engine.

Patterns are trees built from a small set of kinds: literal bit strings,
"any N bits", byte ranges, anchors, alternations, sequences, repetitions
and domain contexts. They match over arrays of bytes at bit granularity,
using skip tables derived from the pattern tree for scanning quickly. Besides
matching, patterns can be measured (number of instances, uniformity),
canonicalized, compared by generality, and checked against random instances
of themselves.

Every pattern lives in a [`PatternPool`]. On top of patterns, a
[`FileType`] combines a pattern for file names and a pattern for file
contents, and a [`Registry`] recognizes the type of files.

# Example

```rust
# use bitpat::{BitRange, Hit, MatchMode, PatternPool};
let mut pool = PatternPool::new();

// The gzip magic number.
let gzip = pool.lit(b"\x1f\x8b").unwrap();

let hit = pool.match_in(
    gzip,
    b"\x00\x1f\x8b\x08",
    BitRange::full(),
    MatchMode::Partial,
);

// Offsets and lengths are in bits.
assert_eq!(hit, Some(Hit::new(8, 16)));
```
*/

pub use bits::{
    is_byte_aligned, to_bit, to_byte, to_padded_byte, BitRange, BYTE, INF,
};
pub use config::{
    load_config_from_file, Config, ContentConfig, SelfCheckConfig,
};
pub use content::content_window;
pub use errors::{
    BuildError, ConsistencyError, ContentError, SelfCheckError,
    SelfCheckFailure,
};
pub use filetype::builtin::register_all;
pub use filetype::{
    Contents, DataFormat, FileType, FileTypeBuilder, FileTypeId, Operation,
    Policy, Registry, Subject,
};
pub use hit::Hit;
pub use mode::MatchMode;
pub use patterns::{
    Anchor, Domain, Kind, Literal, LiteralFlagSet, LiteralFlags, Matcher, Meta,
    PatternId, PatternPool, Repeat, Subs, Uniformity, DEFAULT_GROWTH_BITS,
};
pub use skips::{ByteSet, SkipTable, Starts};

/// Builtin matchers that can be attached to patterns with
/// [`PatternPool::set_matcher`].
pub mod matchers {
    pub use crate::patterns::matchers::{
        ascii_alphabetic, ascii_digit, ascii_hexdigit, ascii_lowercase,
        ascii_uppercase, c_identifier, mask,
    };
}

mod bits;
mod config;
mod content;
mod errors;
mod filetype;
mod hit;
mod mode;
mod patterns;
mod skips;

#[cfg(test)]
mod tests;
