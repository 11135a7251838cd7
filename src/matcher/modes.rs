//! Pairing and inclusion policies.

use serde::{Deserialize, Serialize};

/// Which of several candidate matches for a row are retained in a
/// pairwise match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairMode {
    /// Every scored pair is kept; rows may appear in many pairs.
    All,
    /// Symmetric best: pairs are ranked by ascending score and kept
    /// greedily only while neither of their rows is already claimed, so
    /// no row appears in more than one pair.
    Best,
    /// Best match for each row of the first table; rows of the second
    /// table may repeat.
    Best1,
    /// Best match for each row of the second table; rows of the first
    /// table may repeat.
    Best2,
}

/// Per-table inclusion policy for grouped output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiJoinType {
    /// No constraint; the table's rows appear where matched.
    Default,
    /// Like `Default`, but unmatched rows of the table are also output
    /// as singleton links.
    Always,
    /// Only output links in which the table is represented.
    Match,
    /// Only output links in which the table is absent.
    NoMatch,
}

impl MultiJoinType {
    /// Whether a link with the given per-table presence pattern is
    /// acceptable under these per-table policies.
    pub fn accept(types: &[MultiJoinType], present: &[bool]) -> bool {
        debug_assert_eq!(types.len(), present.len());
        types.iter().zip(present).all(|(t, &p)| match t {
            MultiJoinType::Match => p,
            MultiJoinType::NoMatch => !p,
            MultiJoinType::Default | MultiJoinType::Always => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MultiJoinType::*;

    #[test]
    fn test_accept() {
        // Default/Always impose no constraint.
        assert!(MultiJoinType::accept(&[Default, Always], &[false, false]));
        // Match requires presence.
        assert!(MultiJoinType::accept(&[Match, Default], &[true, false]));
        assert!(!MultiJoinType::accept(&[Match, Default], &[false, true]));
        // NoMatch requires absence.
        assert!(MultiJoinType::accept(&[NoMatch, Match], &[false, true]));
        assert!(!MultiJoinType::accept(&[NoMatch, Match], &[true, true]));
    }
}
