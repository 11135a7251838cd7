//! Axis-aligned ranges in tuple-coordinate space.
//!
//! An [`NdRange`] bounds each tuple column independently; any bound may be
//! absent, meaning the axis is unbounded on that side. Ranges are used
//! only to prune work (rows outside a range cannot match), so all
//! comparisons are permissive: a value that cannot be compared with a
//! bound counts as inside.

use crate::table::Datum;

/// Axis-aligned box over tuple coordinates, with optional bounds per axis.
///
/// Invariant: where both bounds of an axis are present, min ≤ max.
#[derive(Clone, Debug, PartialEq)]
pub struct NdRange {
    mins: Vec<Option<Datum>>,
    maxs: Vec<Option<Datum>>,
}

impl NdRange {
    /// An unbounded range over `ndim` axes.
    pub fn unbounded(ndim: usize) -> Self {
        Self {
            mins: vec![None; ndim],
            maxs: vec![None; ndim],
        }
    }

    /// A range with the given per-axis bounds.
    pub fn from_bounds(mins: Vec<Option<Datum>>, maxs: Vec<Option<Datum>>) -> Self {
        debug_assert_eq!(mins.len(), maxs.len());
        debug_assert!(mins.iter().zip(&maxs).all(|(lo, hi)| match (lo, hi) {
            (Some(lo), Some(hi)) => lo.try_cmp(hi) != Some(std::cmp::Ordering::Greater),
            _ => true,
        }));
        Self { mins, maxs }
    }

    /// Number of axes.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.mins.len()
    }

    /// Lower bound of an axis, if present.
    #[inline]
    pub fn min(&self, axis: usize) -> Option<&Datum> {
        self.mins[axis].as_ref()
    }

    /// Upper bound of an axis, if present.
    #[inline]
    pub fn max(&self, axis: usize) -> Option<&Datum> {
        self.maxs[axis].as_ref()
    }

    /// True if any axis carries a bound.
    pub fn is_bounded(&self) -> bool {
        self.mins.iter().any(Option::is_some) || self.maxs.iter().any(Option::is_some)
    }

    /// Whether a tuple may lie within this range.
    ///
    /// Permissive: absent bounds, short tuples, and incomparable values
    /// never exclude a row. Pruning must not produce false negatives.
    pub fn contains(&self, tuple: &[Datum]) -> bool {
        for (axis, value) in tuple.iter().enumerate().take(self.ndim()) {
            if let Some(lo) = &self.mins[axis] {
                if value.try_cmp(lo) == Some(std::cmp::Ordering::Less) {
                    return false;
                }
            }
            if let Some(hi) = &self.maxs[axis] {
                if value.try_cmp(hi) == Some(std::cmp::Ordering::Greater) {
                    return false;
                }
            }
        }
        true
    }

    /// Intersection of two ranges, or `None` if it is provably empty.
    ///
    /// Per axis the tighter of each pair of bounds wins and a missing
    /// bound defers to the present one; incomparable bounds drop to
    /// unbounded rather than guess.
    pub fn intersection(&self, other: &NdRange) -> Option<NdRange> {
        debug_assert_eq!(self.ndim(), other.ndim());
        let ndim = self.ndim();
        let mut mins = Vec::with_capacity(ndim);
        let mut maxs = Vec::with_capacity(ndim);
        for axis in 0..ndim {
            let lo = tighter_bound(&self.mins[axis], &other.mins[axis], true);
            let hi = tighter_bound(&self.maxs[axis], &other.maxs[axis], false);
            if let (Some(lo), Some(hi)) = (&lo, &hi) {
                if lo.try_cmp(hi) == Some(std::cmp::Ordering::Greater) {
                    return None;
                }
            }
            mins.push(lo);
            maxs.push(hi);
        }
        Some(NdRange { mins, maxs })
    }

    /// Smallest range containing both inputs (per-axis bounding box).
    ///
    /// A side that is unbounded on an axis makes the union unbounded
    /// there too.
    pub fn union(&self, other: &NdRange) -> NdRange {
        debug_assert_eq!(self.ndim(), other.ndim());
        let ndim = self.ndim();
        let mut mins = Vec::with_capacity(ndim);
        let mut maxs = Vec::with_capacity(ndim);
        for axis in 0..ndim {
            mins.push(looser_bound(&self.mins[axis], &other.mins[axis], false));
            maxs.push(looser_bound(&self.maxs[axis], &other.maxs[axis], true));
        }
        NdRange { mins, maxs }
    }
}

/// Tighter of two bounds (intersection): a missing partner keeps the
/// present bound; incomparable pairs fall back to unbounded.
fn tighter_bound(a: &Option<Datum>, b: &Option<Datum>, greater: bool) -> Option<Datum> {
    match (a, b) {
        (Some(a), Some(b)) => pick(a, b, greater),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}

/// Looser of two bounds (union): a missing bound on either side wins
/// outright; incomparable pairs fall back to unbounded.
fn looser_bound(a: &Option<Datum>, b: &Option<Datum>, greater: bool) -> Option<Datum> {
    match (a, b) {
        (Some(a), Some(b)) => pick(a, b, greater),
        _ => None,
    }
}

fn pick(a: &Datum, b: &Datum, greater: bool) -> Option<Datum> {
    match a.try_cmp(b) {
        Some(std::cmp::Ordering::Greater) => Some(if greater { a } else { b }.clone()),
        Some(_) => Some(if greater { b } else { a }.clone()),
        None => None,
    }
}
