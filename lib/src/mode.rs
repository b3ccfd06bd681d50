use serde::{Deserialize, Serialize};

/// How a pattern is matched against a region.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The match must start exactly at the beginning of the region.
    Anchored,
    /// Finds the first occurrence at or after the beginning of the region.
    #[default]
    Partial,
    /// Like [`MatchMode::Anchored`], but the match must also end exactly at
    /// the end of the region.
    Full,
}

impl MatchMode {
    /// Returns `true` for modes where the match starts at the region's
    /// lower bound.
    #[inline]
    pub fn is_anchored(&self) -> bool {
        !matches!(self, Self::Partial)
    }
}
