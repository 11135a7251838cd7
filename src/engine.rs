//! The match-engine contract.
//!
//! Geometry modules (Cartesian, ellipse, sky, ...) implement these traits
//! outside the core; the matcher consumes them and nothing else. Two
//! obligations make the bin-then-score algorithm correct:
//!
//! 1. `match_score` is symmetric in its arguments.
//! 2. If two tuples match (`match_score` returns `Some`), their bin sets
//!    share at least one key.
//!
//! Bins are purely a pruning device: smaller bin sets and rarer overlaps
//! for non-matching tuples make matching faster, never wrong.

use std::hash::Hash;

use crate::coverage::Coverage;
use crate::range::NdRange;
use crate::table::Datum;

/// Per-execution-unit matching state.
///
/// A kit holds whatever private scratch its engine needs (bin buffers,
/// coordinate workspaces) and is therefore not shareable: every thread or
/// task obtains its own kit from [`MatchEngine::create_kit`].
pub trait MatchKit {
    /// Bin key type produced by this kit.
    type Key: Clone + Eq + Hash + Send + Sync;

    /// Closeness of two tuples.
    ///
    /// `None` means the tuples do not match; `Some(0.0)` is a perfect
    /// match and larger values are worse. Must be symmetric.
    fn match_score(&mut self, tuple1: &[Datum], tuple2: &[Datum]) -> Option<f64>;

    /// Bin keys for a tuple, borrowed from kit scratch.
    ///
    /// Tuples with missing or NaN coordinates yield an empty slice, so
    /// they never match anything.
    fn bins(&mut self, tuple: &[Datum]) -> &[Self::Key];
}

/// A notion of row closeness plus the pruning machinery around it.
///
/// The engine itself is immutable and shared; all mutable state lives in
/// the kits and coverages it creates.
pub trait MatchEngine: Send + Sync {
    /// Bin key type.
    type Key: Clone + Eq + Hash + Send + Sync;

    /// Kit type created per execution unit.
    type Kit: MatchKit<Key = Self::Key> + Send;

    /// Coverage type, for engines that can bound their match region.
    type Cov: Coverage;

    /// One-line summary of the match criteria, for logging.
    fn description(&self) -> String;

    /// Create a kit for one execution unit.
    fn create_kit(&self) -> Self::Kit;

    /// A fresh empty coverage, or `None` if this engine cannot describe
    /// its occupied region.
    fn new_coverage(&self) -> Option<Self::Cov> {
        None
    }

    /// Whether [`MatchEngine::match_bounds`] is meaningful.
    fn can_bound_match(&self) -> bool {
        false
    }

    /// Broaden an observed per-table coordinate range to the region in
    /// which rows of table `index` could still match rows of the other
    /// tables.
    ///
    /// `ranges[i]` is the observed range of table `i`; the default is no
    /// broadening. Used purely to prune work.
    fn match_bounds(&self, ranges: &[NdRange], index: usize) -> NdRange {
        ranges[index].clone()
    }
}
