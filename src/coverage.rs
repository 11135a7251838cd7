//! Bounding-region accumulators for cheap row rejection.
//!
//! A [`Coverage`] summarises the region of coordinate space a table's rows
//! occupy. Intersecting the coverages of the tables taking part in a
//! match yields a test that rejects rows which cannot possibly have a
//! partner, before they are ever binned. Coverages may over-report
//! ("might be inside" false positives are fine) but must never
//! under-report.

use std::sync::Arc;

use crate::table::Datum;

/// Row-inclusion predicate shared across execution units.
pub type RowFilter = Arc<dyn Fn(&[Datum]) -> bool + Send + Sync>;

/// A filter that accepts every row.
pub fn pass_all() -> RowFilter {
    Arc::new(|_| true)
}

/// Mutable bounding-region accumulator over a stream of tuples.
///
/// Accumulation (`extend`) and combination (`union`, `intersection`) must
/// be consistent: the union of two coverages built from disjoint row sets
/// must cover everything a single coverage built from all rows would.
/// That makes coverage reading safe to parallelise by split and merge.
pub trait Coverage: Clone + Send {
    /// Grow the region to cover one tuple (plus any match tolerance the
    /// implementation bakes in). Tuples without usable coordinates are
    /// ignored.
    fn extend(&mut self, tuple: &[Datum]);

    /// Grow this region to cover another.
    fn union(&mut self, other: &Self);

    /// Shrink this region to the overlap with another.
    fn intersection(&mut self, other: &Self);

    /// True if the region provably contains no points.
    fn is_empty(&self) -> bool;

    /// Cheap inclusion test capturing the current region.
    fn tester(&self) -> RowFilter;

    /// Human-readable summary for logging.
    fn describe(&self) -> String;
}

/// Cartesian cuboid coverage over the leading numeric columns of a tuple.
///
/// Each extension grows the box by the tuple's coordinates broadened by a
/// fixed margin (normally the engine's match tolerance), so that the
/// intersection of two tables' coverages contains every possible matched
/// row of either table.
#[derive(Clone, Debug)]
pub struct CuboidCoverage {
    margin: f64,
    mins: Vec<f64>,
    maxs: Vec<f64>,
    empty: bool,
}

impl CuboidCoverage {
    /// New empty coverage over `ndim` coordinates with a broadening
    /// margin per side.
    pub fn new(ndim: usize, margin: f64) -> Self {
        Self {
            margin,
            mins: vec![f64::INFINITY; ndim],
            maxs: vec![f64::NEG_INFINITY; ndim],
            empty: true,
        }
    }

    /// Number of covered coordinates.
    #[inline]
    pub fn ndim(&self) -> usize {
        self.mins.len()
    }

    fn coords(&self, tuple: &[Datum]) -> Option<Vec<f64>> {
        if tuple.len() < self.ndim() {
            return None;
        }
        tuple[..self.ndim()].iter().map(Datum::as_f64).collect()
    }
}

impl Coverage for CuboidCoverage {
    fn extend(&mut self, tuple: &[Datum]) {
        let Some(coords) = self.coords(tuple) else {
            return;
        };
        for (axis, x) in coords.into_iter().enumerate() {
            self.mins[axis] = self.mins[axis].min(x - self.margin);
            self.maxs[axis] = self.maxs[axis].max(x + self.margin);
        }
        self.empty = false;
    }

    fn union(&mut self, other: &Self) {
        debug_assert_eq!(self.ndim(), other.ndim());
        if other.empty {
            return;
        }
        for axis in 0..self.ndim() {
            self.mins[axis] = self.mins[axis].min(other.mins[axis]);
            self.maxs[axis] = self.maxs[axis].max(other.maxs[axis]);
        }
        self.empty = false;
    }

    fn intersection(&mut self, other: &Self) {
        debug_assert_eq!(self.ndim(), other.ndim());
        if self.empty {
            return;
        }
        if other.empty {
            self.empty = true;
            return;
        }
        for axis in 0..self.ndim() {
            self.mins[axis] = self.mins[axis].max(other.mins[axis]);
            self.maxs[axis] = self.maxs[axis].min(other.maxs[axis]);
            if self.mins[axis] > self.maxs[axis] {
                self.empty = true;
                return;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.empty
    }

    fn tester(&self) -> RowFilter {
        if self.empty {
            return Arc::new(|_| false);
        }
        let mins = self.mins.clone();
        let maxs = self.maxs.clone();
        Arc::new(move |tuple: &[Datum]| {
            if tuple.len() < mins.len() {
                return false;
            }
            for (axis, value) in tuple[..mins.len()].iter().enumerate() {
                match value.as_f64() {
                    Some(x) if x >= mins[axis] && x <= maxs[axis] => {}
                    _ => return false,
                }
            }
            true
        })
    }

    fn describe(&self) -> String {
        if self.empty {
            return "empty".to_owned();
        }
        let axes: Vec<String> = self
            .mins
            .iter()
            .zip(&self.maxs)
            .map(|(lo, hi)| format!("[{lo:.6}, {hi:.6}]"))
            .collect();
        axes.join(" x ")
    }
}

/// Coverage for engines that cannot bound their match region.
///
/// Never used at run time; exists so such engines can still name a
/// concrete coverage type.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCoverage;

impl Coverage for NoCoverage {
    fn extend(&mut self, _tuple: &[Datum]) {}
    fn union(&mut self, _other: &Self) {}
    fn intersection(&mut self, _other: &Self) {}
    fn is_empty(&self) -> bool {
        false
    }
    fn tester(&self) -> RowFilter {
        pass_all()
    }
    fn describe(&self) -> String {
        "full".to_owned()
    }
}
