//! Groups of mutually associated rows.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::RowRef;

/// A partner row together with its match score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredRef {
    /// The partner row.
    pub target: RowRef,
    /// Closeness score against the hub row (0.0 = perfect).
    pub score: f64,
}

/// Payload distinguishing the link shapes.
#[derive(Clone, Debug)]
enum LinkKind {
    /// Singleton or plain group.
    Plain,
    /// Two refs forming a scored pairwise match.
    Pair { score: f64 },
    /// One reference row plus scored partners (multi-pair mode); the
    /// partners are associated with the hub, not with each other.
    Hub {
        hub: RowRef,
        partners: Box<[ScoredRef]>,
    },
}

/// An ordered, duplicate-free group of [`RowRef`]s.
///
/// Identity (equality, hashing, ordering) depends only on the ref
/// sequence: two links over the same rows are the same link no matter how
/// they were built or what scores they carry.
#[derive(Clone)]
pub struct RowLink {
    refs: Box<[RowRef]>,
    kind: LinkKind,
}

impl RowLink {
    /// A singleton link.
    pub fn single(r: RowRef) -> Self {
        Self {
            refs: Box::new([r]),
            kind: LinkKind::Plain,
        }
    }

    /// A scored pairwise match.
    pub fn pair(a: RowRef, b: RowRef, score: f64) -> Self {
        debug_assert_ne!(a, b);
        let refs = if a <= b { [a, b] } else { [b, a] };
        Self {
            refs: Box::new(refs),
            kind: LinkKind::Pair { score },
        }
    }

    /// A plain group over the given refs (sorted and deduplicated here).
    pub fn group(refs: impl IntoIterator<Item = RowRef>) -> Self {
        let mut refs: Vec<RowRef> = refs.into_iter().collect();
        refs.sort_unstable();
        refs.dedup();
        Self {
            refs: refs.into_boxed_slice(),
            kind: LinkKind::Plain,
        }
    }

    /// A hub link: one reference row plus its scored partners.
    pub fn hub(hub: RowRef, mut partners: Vec<ScoredRef>) -> Self {
        partners.sort_unstable_by(|a, b| a.target.cmp(&b.target));
        let mut refs: Vec<RowRef> = Vec::with_capacity(partners.len() + 1);
        refs.push(hub);
        refs.extend(partners.iter().map(|p| p.target));
        refs.sort_unstable();
        refs.dedup();
        Self {
            refs: refs.into_boxed_slice(),
            kind: LinkKind::Hub {
                hub,
                partners: partners.into_boxed_slice(),
            },
        }
    }

    /// Number of refs in the link.
    #[inline]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// True for a link with no refs (never produced by the matcher).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// The refs, sorted ascending.
    #[inline]
    pub fn refs(&self) -> &[RowRef] {
        &self.refs
    }

    /// Score of a pairwise link, if this is one.
    pub fn score(&self) -> Option<f64> {
        match &self.kind {
            LinkKind::Pair { score } => Some(*score),
            _ => None,
        }
    }

    /// Hub row and scored partners of a hub link, if this is one.
    pub fn hub_parts(&self) -> Option<(RowRef, &[ScoredRef])> {
        match &self.kind {
            LinkKind::Hub { hub, partners } => Some((*hub, partners)),
            _ => None,
        }
    }

    /// Number of distinct tables represented among the refs.
    pub fn table_count(&self) -> usize {
        let mut n = 0;
        let mut last = None;
        for r in self.refs.iter() {
            if last != Some(r.table) {
                n += 1;
                last = Some(r.table);
            }
        }
        n
    }
}

impl PartialEq for RowLink {
    fn eq(&self, other: &Self) -> bool {
        self.refs == other.refs
    }
}

impl Eq for RowLink {}

impl Hash for RowLink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.refs.hash(state);
    }
}

impl PartialOrd for RowLink {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowLink {
    fn cmp(&self, other: &Self) -> Ordering {
        self.refs.cmp(&other.refs)
    }
}

impl fmt::Debug for RowLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LinkKind::Plain => write!(f, "Link{:?}", self.refs),
            LinkKind::Pair { score } => {
                write!(f, "Pair{:?}@{score}", self.refs)
            }
            LinkKind::Hub { hub, .. } => {
                write!(f, "Hub({hub:?}){:?}", self.refs)
            }
        }
    }
}
