//! Isotropic Cartesian match engine for tests and demos.

use crate::coverage::CuboidCoverage;
use crate::engine::{MatchEngine, MatchKit};
use crate::range::NdRange;
use crate::table::Datum;

/// Grid-cell bin key: one integer cell index per dimension.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CellKey(Box<[i64]>);

/// Matches n-dimensional points whose Euclidean separation is within a
/// fixed tolerance.
///
/// Bins are the cells of a grid with spacing twice the tolerance; a
/// tuple hashes into every cell overlapped by the tolerance box around
/// its point, which is one or two cells per dimension. Any two points
/// within tolerance therefore share at least one cell, which is what
/// the bin contract requires.
#[derive(Clone, Debug)]
pub struct CartesianEngine {
    ndim: usize,
    tolerance: f64,
}

impl CartesianEngine {
    /// New engine over `ndim` leading coordinate columns.
    pub fn new(ndim: usize, tolerance: f64) -> Self {
        debug_assert!(tolerance > 0.0);
        Self { ndim, tolerance }
    }
}

impl MatchEngine for CartesianEngine {
    type Key = CellKey;
    type Kit = CartesianKit;
    type Cov = CuboidCoverage;

    fn description(&self) -> String {
        format!(
            "cartesian {}-d, tolerance {}",
            self.ndim, self.tolerance
        )
    }

    fn create_kit(&self) -> CartesianKit {
        CartesianKit {
            ndim: self.ndim,
            tolerance: self.tolerance,
            cell: 2.0 * self.tolerance,
            coords: Vec::with_capacity(self.ndim),
            keys: Vec::new(),
        }
    }

    fn new_coverage(&self) -> Option<CuboidCoverage> {
        Some(CuboidCoverage::new(self.ndim, self.tolerance))
    }

    fn can_bound_match(&self) -> bool {
        true
    }

    fn match_bounds(&self, ranges: &[NdRange], index: usize) -> NdRange {
        let range = &ranges[index];
        let mut mins = Vec::with_capacity(range.ndim());
        let mut maxs = Vec::with_capacity(range.ndim());
        for axis in 0..range.ndim() {
            if axis < self.ndim {
                // Non-numeric bounds cannot be broadened; dropping them
                // only widens the range, which is always safe.
                mins.push(
                    range
                        .min(axis)
                        .and_then(Datum::as_f64)
                        .map(|x| Datum::Real(x - self.tolerance)),
                );
                maxs.push(
                    range
                        .max(axis)
                        .and_then(Datum::as_f64)
                        .map(|x| Datum::Real(x + self.tolerance)),
                );
            } else {
                mins.push(range.min(axis).cloned());
                maxs.push(range.max(axis).cloned());
            }
        }
        NdRange::from_bounds(mins, maxs)
    }
}

/// Per-execution-unit state for [`CartesianEngine`].
pub struct CartesianKit {
    ndim: usize,
    tolerance: f64,
    cell: f64,
    coords: Vec<f64>,
    keys: Vec<CellKey>,
}

impl CartesianKit {
    /// Read the leading coordinates; `false` if any is missing or NaN.
    fn read_coords(&mut self, tuple: &[Datum]) -> bool {
        self.coords.clear();
        for axis in 0..self.ndim {
            match tuple.get(axis).and_then(Datum::as_f64) {
                Some(x) => self.coords.push(x),
                None => return false,
            }
        }
        true
    }
}

impl MatchKit for CartesianKit {
    type Key = CellKey;

    fn match_score(&mut self, tuple1: &[Datum], tuple2: &[Datum]) -> Option<f64> {
        let mut d2 = 0.0;
        for axis in 0..self.ndim {
            let a = tuple1.get(axis).and_then(Datum::as_f64)?;
            let b = tuple2.get(axis).and_then(Datum::as_f64)?;
            let d = a - b;
            d2 += d * d;
        }
        let dist = d2.sqrt();
        (dist <= self.tolerance).then_some(dist)
    }

    fn bins(&mut self, tuple: &[Datum]) -> &[CellKey] {
        self.keys.clear();
        if !self.read_coords(tuple) {
            return &self.keys;
        }
        // Cells overlapped by the tolerance box around the point, as the
        // cartesian product over dimensions.
        let mut combos: Vec<Vec<i64>> = vec![Vec::with_capacity(self.ndim)];
        for &x in &self.coords {
            let lo = ((x - self.tolerance) / self.cell).floor() as i64;
            let hi = ((x + self.tolerance) / self.cell).floor() as i64;
            let mut next = Vec::with_capacity(combos.len() * 2);
            for combo in &combos {
                for c in lo..=hi {
                    let mut extended = combo.clone();
                    extended.push(c);
                    next.push(extended);
                }
            }
            combos = next;
        }
        self.keys
            .extend(combos.into_iter().map(|c| CellKey(c.into_boxed_slice())));
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reals(xs: &[f64]) -> Vec<Datum> {
        xs.iter().map(|&x| Datum::Real(x)).collect()
    }

    #[test]
    fn test_score_symmetric_within_tolerance() {
        let engine = CartesianEngine::new(2, 1.0);
        let mut kit = engine.create_kit();
        let a = reals(&[0.0, 0.0]);
        let b = reals(&[0.6, 0.8]);
        let ab = kit.match_score(&a, &b);
        let ba = kit.match_score(&b, &a);
        assert_eq!(ab, ba);
        assert!((ab.unwrap() - 1.0).abs() < 1e-12);

        let c = reals(&[1.1, 0.0]);
        assert!(kit.match_score(&a, &c).is_none());
    }

    #[test]
    fn test_matching_tuples_share_a_bin() {
        let engine = CartesianEngine::new(1, 0.5);
        let mut kit = engine.create_kit();
        for (x, y) in [(0.0, 0.4), (0.99, 1.2), (-0.3, 0.2), (7.75, 8.25)] {
            let a = reals(&[x]);
            let b = reals(&[y]);
            if kit.match_score(&a, &b).is_some() {
                let bins_a: Vec<CellKey> = kit.bins(&a).to_vec();
                let bins_b: Vec<CellKey> = kit.bins(&b).to_vec();
                assert!(
                    bins_a.iter().any(|k| bins_b.contains(k)),
                    "no shared bin for {x} and {y}"
                );
            }
        }
    }

    #[test]
    fn test_nan_and_missing_yield_no_bins() {
        let engine = CartesianEngine::new(2, 0.5);
        let mut kit = engine.create_kit();
        assert!(kit.bins(&reals(&[1.0])).is_empty());
        assert!(kit
            .bins(&[Datum::Real(f64::NAN), Datum::Real(0.0)])
            .is_empty());
        assert!(kit.bins(&[Datum::Null, Datum::Real(0.0)]).is_empty());
        assert!(kit
            .match_score(&[Datum::Null, Datum::Real(0.0)], &reals(&[0.0, 0.0]))
            .is_none());
    }

    #[test]
    fn test_match_bounds_broadens() {
        let engine = CartesianEngine::new(1, 0.5);
        let ranges = vec![NdRange::from_bounds(
            vec![Some(Datum::Real(0.0))],
            vec![Some(Datum::Real(10.0))],
        )];
        let broadened = engine.match_bounds(&ranges, 0);
        assert_eq!(broadened.min(0), Some(&Datum::Real(-0.5)));
        assert_eq!(broadened.max(0), Some(&Datum::Real(10.5)));
    }
}
