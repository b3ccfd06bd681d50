use thiserror::Error;

use crate::patterns::PatternId;

/// Error returned when a pattern or file type can't be constructed.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// A literal without a single bit.
    #[error("empty literal")]
    EmptyLiteral,

    /// Literal flags were given for a literal that is not made of whole
    /// bytes.
    #[error("literal flags require a literal made of whole bytes")]
    UnalignedLiteralFlags,

    /// A zero-width `Any` pattern.
    #[error("`any` pattern with zero bits")]
    EmptyAny,

    /// A byte range where the lower bound is greater than the upper one.
    #[error("invalid byte range {lo:#04x}-{hi:#04x}")]
    InvalidRange {
        /// Lower bound.
        lo: u8,
        /// Upper bound.
        hi: u8,
    },

    /// A repetition where the minimum is greater than the maximum.
    #[error("invalid repetition {{{min},{max}}}")]
    InvalidRepetition {
        /// Minimum number of repetitions.
        min: u64,
        /// Maximum number of repetitions.
        max: u64,
    },

    /// A file type without name pattern nor content pattern.
    #[error("file type `{name}` has neither name nor content pattern")]
    MissingPatterns {
        /// Name of the file type.
        name: String,
    },

    /// The pattern tree is not consistent.
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// Error that indicates a misuse of the pattern arena.
///
/// These errors are never produced by matching, they are detected while the
/// pattern tree is being built or modified.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConsistencyError {
    /// The pattern doesn't exist, or it was already destroyed.
    #[error("unknown pattern {0:?}")]
    UnknownPattern(PatternId),

    /// A pattern was released more times than it was retained.
    #[error("pattern {0:?} released without being retained")]
    RootUnderflow(PatternId),

    /// Adding the sub-pattern would make the pattern contain itself.
    #[error("adding {sub:?} to {multi:?} creates a cycle")]
    Cycle {
        /// The pattern being extended.
        multi: PatternId,
        /// The pattern being added.
        sub: PatternId,
    },

    /// Sub-patterns can be pushed only to alternations and sequences.
    #[error("pattern {0:?} is not an alternation or a sequence")]
    NotMulti(PatternId),
}

/// Error returned when the contents of a file can't be obtained.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContentError {
    /// Could not obtain the file size.
    #[error("can not obtain file metadata: {err}")]
    MetadataError {
        /// Error that occurred.
        err: std::io::Error,
    },
    /// Could not map the window into memory.
    #[error("can not map {len} bytes at offset {offset}: {err}")]
    MapError {
        /// Offset of the window within the file.
        offset: u64,
        /// Length of the window.
        len: usize,
        /// Error that occurred.
        err: std::io::Error,
    },
    /// Could not read the window, this includes short reads.
    #[error("can not read {len} bytes at offset {offset}: {err}")]
    ReadError {
        /// Offset of the window within the file.
        offset: u64,
        /// Length of the window.
        len: usize,
        /// Error that occurred.
        err: std::io::Error,
    },
}

/// Why an instance failed the self-check of a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelfCheckFailure {
    /// The pattern doesn't match the instance.
    NoMatch,
    /// The skip table rejects the first byte of the instance.
    Skipped,
}

/// Error returned when a pattern fails to match one of its own random
/// instances.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("pattern {pattern:?} fails on instance {instance:02x?} ({bits} bits): {failure:?}")]
pub struct SelfCheckError {
    /// The pattern being checked.
    pub pattern: PatternId,
    /// Bytes of the failing instance, padded with zeroes.
    pub instance: Vec<u8>,
    /// Length of the instance in bits.
    pub bits: u64,
    /// What went wrong.
    pub failure: SelfCheckFailure,
}
