//! Concrete collectors for the bulk steps of matching.

use super::Collector;
use crate::bins::{LongBinner, ObjectBinner};
use crate::coverage::{Coverage, RowFilter};
use crate::engine::{MatchEngine, MatchKit};
use crate::error::{Error, Result};
use crate::link::{LinkSet, RowLink, RowRef};
use crate::range::NdRange;
use crate::table::{Datum, RowAccess, Table};

// ---------------------------------------------------------------------------
// Bin row indices (phase 1 of the pairwise scan)

/// Bins the row indices of the random-side table by match key.
pub(crate) struct BinIndexCollector<'a, E: MatchEngine> {
    pub engine: &'a E,
    pub filter: RowFilter,
    pub row_count: u64,
}

/// Result of binning one table's row indices.
pub(crate) struct BinnedIndices<E: MatchEngine> {
    kit: E::Kit,
    pub binner: LongBinner<E::Key>,
    /// Total key entries stored (rows times keys per row).
    pub n_ref: u64,
    /// Rows rejected by the row filter.
    pub n_exclude: u64,
}

impl<E: MatchEngine> Collector for BinIndexCollector<'_, E> {
    type Accum = BinnedIndices<E>;

    fn accumulator(&self) -> Result<Self::Accum> {
        Ok(BinnedIndices {
            kit: self.engine.create_kit(),
            binner: LongBinner::for_rows(self.row_count),
            n_ref: 0,
            n_exclude: 0,
        })
    }

    fn accumulate(&self, index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        if !(self.filter)(row) {
            acc.n_exclude += 1;
            return Ok(());
        }
        let keys = acc.kit.bins(row);
        for key in keys {
            acc.binner.add_item(key.clone(), index);
        }
        acc.n_ref += keys.len() as u64;
        Ok(())
    }

    fn combine(&self, a: Self::Accum, b: Self::Accum) -> Self::Accum {
        BinnedIndices {
            kit: a.kit,
            binner: a.binner.combine(b.binner),
            n_ref: a.n_ref + b.n_ref,
            n_exclude: a.n_exclude + b.n_exclude,
        }
    }
}

// ---------------------------------------------------------------------------
// Bin row refs (cross-table candidate grouping)

/// Bins [`RowRef`]s of one table by match key into an [`ObjectBinner`].
///
/// With `allowed` set, only keys already present in that binner may gain
/// entries; this restricts candidate grouping to bins seeded by a
/// reference table.
pub(crate) struct BinRefCollector<'a, E: MatchEngine> {
    pub engine: &'a E,
    pub filter: RowFilter,
    pub table_index: u32,
    pub allowed: Option<&'a ObjectBinner<E::Key, RowRef>>,
}

/// Result of binning one table's refs.
pub(crate) struct BinnedRefs<E: MatchEngine> {
    kit: E::Kit,
    pub binner: ObjectBinner<E::Key, RowRef>,
    /// Rows that passed the row filter.
    pub n_include: u64,
}

impl<E: MatchEngine> Collector for BinRefCollector<'_, E> {
    type Accum = BinnedRefs<E>;

    fn accumulator(&self) -> Result<Self::Accum> {
        Ok(BinnedRefs {
            kit: self.engine.create_kit(),
            binner: ObjectBinner::new(),
            n_include: 0,
        })
    }

    fn accumulate(&self, index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        if !(self.filter)(row) {
            return Ok(());
        }
        acc.n_include += 1;
        let keys = acc.kit.bins(row);
        if !keys.is_empty() {
            let rref = RowRef::new(self.table_index, index);
            for key in keys {
                if self.allowed.map_or(true, |b| b.contains_key(key)) {
                    acc.binner.add_item(key.clone(), rref);
                }
            }
        }
        Ok(())
    }

    fn combine(&self, a: Self::Accum, b: Self::Accum) -> Self::Accum {
        BinnedRefs {
            kit: a.kit,
            binner: a.binner.combine(b.binner),
            n_include: a.n_include + b.n_include,
        }
    }
}

// ---------------------------------------------------------------------------
// Pair scan (phase 2 of the pairwise scan)

/// Scans the sequential-side table, scoring its rows against binned
/// candidates from the random-side table.
pub(crate) struct PairScanCollector<'a, E: MatchEngine> {
    pub engine: &'a E,
    pub filter: RowFilter,
    pub table_r: &'a dyn Table,
    pub index_r: u32,
    pub index_s: u32,
    /// Keep only the minimum-score candidate per scanned row.
    pub best_only: bool,
    pub binner_r: &'a LongBinner<E::Key>,
}

/// Accumulated pair links plus per-worker scan state.
pub(crate) struct PairScan<'a, E: MatchEngine> {
    kit: E::Kit,
    access_r: Box<dyn RowAccess + Send + 'a>,
    pub links: LinkSet,
    candidates: Vec<u64>,
}

impl<'a, E: MatchEngine> Collector for PairScanCollector<'a, E> {
    type Accum = PairScan<'a, E>;

    fn accumulator(&self) -> Result<Self::Accum> {
        Ok(PairScan {
            kit: self.engine.create_kit(),
            access_r: self.table_r.row_access()?,
            links: LinkSet::new(),
            candidates: Vec::new(),
        })
    }

    fn accumulate(&self, index_s: u64, row_s: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        if !(self.filter)(row_s) {
            return Ok(());
        }

        // Union of all R rows sharing a bin with this row, deduplicated
        // and sorted so the scan order is deterministic.
        let keys = acc.kit.bins(row_s);
        acc.candidates.clear();
        for key in keys {
            if let Some(rows) = self.binner_r.get(key) {
                acc.candidates.extend(rows);
            }
        }
        if acc.candidates.is_empty() {
            return Ok(());
        }
        acc.candidates.sort_unstable();
        acc.candidates.dedup();

        let mut best: Option<(u64, f64)> = None;
        for i in 0..acc.candidates.len() {
            let index_r = acc.candidates[i];
            let row_r = acc.access_r.row(index_r)?;
            if let Some(score) = acc.kit.match_score(row_s, row_r) {
                if self.best_only {
                    if best.map_or(true, |(_, b)| score < b) {
                        best = Some((index_r, score));
                    }
                } else {
                    acc.links.insert(RowLink::pair(
                        RowRef::new(self.index_r, index_r),
                        RowRef::new(self.index_s, index_s),
                        score,
                    ));
                }
            }
        }
        if let Some((index_r, score)) = best {
            acc.links.insert(RowLink::pair(
                RowRef::new(self.index_r, index_r),
                RowRef::new(self.index_s, index_s),
                score,
            ));
        }
        Ok(())
    }

    fn combine(&self, a: Self::Accum, b: Self::Accum) -> Self::Accum {
        PairScan {
            kit: a.kit,
            access_r: a.access_r,
            links: a.links.merge(b.links),
            candidates: a.candidates,
        }
    }
}

// ---------------------------------------------------------------------------
// Column ranges

/// Accumulates the observed per-column value range of a table.
pub(crate) struct RangeCollector {
    pub ncol: usize,
}

/// Observed bounds plus incomparability bookkeeping.
pub(crate) struct RangeAccum {
    mins: Vec<Option<Datum>>,
    maxs: Vec<Option<Datum>>,
    /// Axes where mutually incomparable values were seen; such axes
    /// report unbounded rather than guess at an ordering.
    poisoned: Vec<bool>,
    pub n_incomparable: u64,
}

impl RangeAccum {
    pub fn into_range(mut self) -> NdRange {
        for axis in 0..self.poisoned.len() {
            if self.poisoned[axis] {
                self.mins[axis] = None;
                self.maxs[axis] = None;
            }
        }
        NdRange::from_bounds(self.mins, self.maxs)
    }

    fn update(&mut self, axis: usize, value: &Datum, keep: std::cmp::Ordering) {
        if self.poisoned[axis] {
            return;
        }
        let bound = if keep == std::cmp::Ordering::Less {
            &mut self.mins[axis]
        } else {
            &mut self.maxs[axis]
        };
        match bound {
            None => *bound = Some(value.clone()),
            Some(current) => match value.try_cmp(current) {
                Some(order) if order == keep => *bound = Some(value.clone()),
                Some(_) => {}
                None => {
                    self.poisoned[axis] = true;
                    self.n_incomparable += 1;
                }
            },
        }
    }
}

impl Collector for RangeCollector {
    type Accum = RangeAccum;

    fn accumulator(&self) -> Result<Self::Accum> {
        Ok(RangeAccum {
            mins: vec![None; self.ncol],
            maxs: vec![None; self.ncol],
            poisoned: vec![false; self.ncol],
            n_incomparable: 0,
        })
    }

    fn accumulate(&self, _index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        for (axis, value) in row.iter().enumerate().take(self.ncol) {
            if value.is_null() {
                continue;
            }
            acc.update(axis, value, std::cmp::Ordering::Less);
            acc.update(axis, value, std::cmp::Ordering::Greater);
        }
        Ok(())
    }

    fn combine(&self, mut a: Self::Accum, b: Self::Accum) -> Self::Accum {
        for axis in 0..self.ncol {
            if b.poisoned[axis] {
                a.poisoned[axis] = true;
            }
            if let Some(min) = &b.mins[axis] {
                a.update(axis, min, std::cmp::Ordering::Less);
            }
            if let Some(max) = &b.maxs[axis] {
                a.update(axis, max, std::cmp::Ordering::Greater);
            }
        }
        a.n_incomparable += b.n_incomparable;
        a
    }
}

// ---------------------------------------------------------------------------
// Filtered row count

/// Counts rows accepted by a filter.
pub(crate) struct CountCollector {
    pub filter: RowFilter,
}

impl Collector for CountCollector {
    type Accum = u64;

    fn accumulator(&self) -> Result<Self::Accum> {
        Ok(0)
    }

    fn accumulate(&self, _index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        if (self.filter)(row) {
            *acc += 1;
        }
        Ok(())
    }

    fn combine(&self, a: Self::Accum, b: Self::Accum) -> Self::Accum {
        a + b
    }
}

// ---------------------------------------------------------------------------
// Coverage reading

/// Accumulates an engine coverage over a table's rows.
pub(crate) struct CoverageCollector<'a, E: MatchEngine> {
    pub engine: &'a E,
}

impl<E: MatchEngine> Collector for CoverageCollector<'_, E> {
    type Accum = E::Cov;

    fn accumulator(&self) -> Result<Self::Accum> {
        self.engine.new_coverage().ok_or_else(|| {
            Error::Config("engine does not support coverages".to_owned())
        })
    }

    fn accumulate(&self, _index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()> {
        acc.extend(row);
        Ok(())
    }

    fn combine(&self, mut a: Self::Accum, b: Self::Accum) -> Self::Accum {
        a.union(&b);
        a
    }
}
