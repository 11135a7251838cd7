//! # Milan-Match: Approximate Tabular Crossmatching
//!
//! Finds the pairs or groups of rows across large tables that count as
//! matches under a caller-supplied notion of closeness, without the
//! O(N×M) cost of comparing every pair.
//!
//! ## How it works
//!
//! A [`MatchEngine`] maps each row tuple to a score function and to a
//! set of opaque *bin keys* (a fuzzy hash): any two tuples that match
//! are guaranteed to share at least one key. Candidate generation then
//! reduces to hashing rows into bins and scoring only co-binned pairs;
//! bins prune the quadratic search without ever losing a true match.
//!
//! ## Matching modes
//!
//! - **Pair match** ([`RowMatcher::find_pair_matches`]): two tables,
//!   scored row pairs, with [`PairMode`] selecting all/best policies.
//! - **Group match** ([`RowMatcher::find_group_matches`]): any number of
//!   tables; pairwise matches agglomerate into transitive-closure groups
//!   with at most one row per table.
//! - **Internal match** ([`RowMatcher::find_internal_matches`]): finds
//!   duplicate or near-duplicate rows within a single table.
//! - **Multi-pair match** ([`RowMatcher::find_multi_pair_matches`]):
//!   hub-and-spoke matches from one reference table to all the others.
//!
//! ## Architecture
//!
//! - [`engine`]: the consumed match/coverage contract
//! - [`table`]: the consumed row-access contract
//! - [`bins`]: compact multi-maps backing candidate generation
//! - [`link`]: row identities, links, and deduplicating link sets
//! - [`compute`]: sequential and parallel execution strategies
//! - [`matcher`]: the matching modes themselves
//! - [`coverage`] / [`range`]: bounding regions used to prune work
//! - [`progress`]: stage-structured progress and interruption
//! - [`harness`]: in-memory table and demo engine for tests
//!
//! ## Data flow
//!
//! ```text
//!  tables ──► bin phase ──► LongBinner / ObjectBinner
//!                               │ co-binned candidates
//!                               ▼
//!                        score (MatchKit) ──► scored pair links
//!                               │
//!                               ▼
//!                  agglomeration (union-find) ──► LinkSet of groups
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use milan_match::harness::{CartesianEngine, MemoryTable};
//! use milan_match::{PairMode, RowMatcher, Table};
//!
//! let a = MemoryTable::of_reals(&[&[0.0], &[10.0]]);
//! let b = MemoryTable::of_reals(&[&[0.2], &[10.6], &[50.0]]);
//! let engine = CartesianEngine::new(1, 0.75);
//!
//! let tables: [&dyn Table; 2] = [&a, &b];
//! let matcher = RowMatcher::new(&engine, &tables);
//! let links = matcher.find_pair_matches(PairMode::All)?;
//! assert_eq!(links.len(), 2);
//! # Ok::<(), milan_match::Error>(())
//! ```

pub mod bins;
pub mod compute;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod harness;
pub mod link;
pub mod matcher;
pub mod progress;
pub mod range;
pub mod table;

// Re-export the main types at the crate root.
pub use compute::Computer;
pub use config::ParallelConfig;
pub use coverage::{Coverage, CuboidCoverage, RowFilter};
pub use engine::{MatchEngine, MatchKit};
pub use error::{Error, Result};
pub use link::{LinkSet, RowLink, RowRef, ScoredRef};
pub use matcher::{MultiJoinType, PairMode, RowMatcher};
pub use progress::{
    InterruptibleProgress, LogProgress, NullProgress, ProgressIndicator,
};
pub use range::NdRange;
pub use table::{Datum, RowAccess, RowReader, Table};
