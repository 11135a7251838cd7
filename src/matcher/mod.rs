//! Orchestration of the matching modes.
//!
//! A [`RowMatcher`] ties together a match engine, the input tables, and
//! an execution strategy, and exposes the four terminal operations: pair
//! match, group match, internal match, and hub-style multi-pair match.
//! The matcher is stateless across calls; binners, link sets, and ranges
//! are created, drained, and discarded within each operation.

mod agglomerate;
mod modes;

pub use modes::{MultiJoinType, PairMode};

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::bins::{LongBinner, ObjectBinner};
use crate::compute::{
    BinIndexCollector, BinRefCollector, Computer, CountCollector,
    CoverageCollector, PairScanCollector, RangeCollector,
};
use crate::coverage::{pass_all, Coverage, RowFilter};
use crate::engine::{MatchEngine, MatchKit};
use crate::error::{Error, Result};
use crate::link::{LinkSet, RowLink, RowRef, ScoredRef};
use crate::progress::{NullProgress, ProgressIndicator, ProgressTracker};
use crate::range::NdRange;
use crate::table::{Datum, RowAccess, Table};

/// Performs matching on the rows of one or more tables.
///
/// What counts as a match comes from the [`MatchEngine`]; the generic
/// parts of the algorithms (binning, candidate scanning, agglomeration,
/// pruning) live here. Link sets handled during a match can be very
/// large, so intermediate collections are drained as they are consumed.
pub struct RowMatcher<'a, E: MatchEngine> {
    engine: &'a E,
    tables: &'a [&'a dyn Table],
    computer: Computer,
    indicator: Box<dyn ProgressIndicator>,
}

/// Common match region of two tables plus in-region row counts.
struct Intersection {
    filter: RowFilter,
    empty: bool,
    /// Rows inside the region, aligned with the queried table indices.
    counts: Vec<u64>,
}

impl Intersection {
    fn empty() -> Self {
        Self {
            filter: never(),
            empty: true,
            counts: Vec::new(),
        }
    }

    fn full(counts: Vec<u64>) -> Self {
        Self {
            filter: pass_all(),
            empty: false,
            counts,
        }
    }
}

fn never() -> RowFilter {
    Arc::new(|_| false)
}

fn range_filter(range: NdRange) -> RowFilter {
    Arc::new(move |row| range.contains(row))
}

/// Fetch and materialise the tuples a link refers to.
fn fetch_rows<'x>(
    accesses: &mut [Box<dyn RowAccess + Send + 'x>],
    link: &RowLink,
) -> Result<Vec<Vec<Datum>>> {
    let mut rows = Vec::with_capacity(link.len());
    for r in link.refs() {
        rows.push(accesses[r.table as usize].row(r.row)?.to_vec());
    }
    Ok(rows)
}

/// Reduce scored partners to the best-scoring one per partner table.
fn best_per_table(partners: Vec<ScoredRef>) -> Vec<ScoredRef> {
    let mut best: HashMap<u32, ScoredRef> = HashMap::new();
    for p in partners {
        match best.entry(p.target.table) {
            Entry::Vacant(e) => {
                e.insert(p);
            }
            Entry::Occupied(mut e) => {
                let cur = e.get();
                let order = p
                    .score
                    .total_cmp(&cur.score)
                    .then_with(|| p.target.cmp(&cur.target));
                if order == std::cmp::Ordering::Less {
                    e.insert(p);
                }
            }
        }
    }
    best.into_values().collect()
}

impl<'a, E: MatchEngine> RowMatcher<'a, E> {
    /// New matcher over the given engine and tables, with sequential
    /// execution and no progress output.
    pub fn new(engine: &'a E, tables: &'a [&'a dyn Table]) -> Self {
        Self {
            engine,
            tables,
            computer: Computer::Sequential,
            indicator: Box::new(NullProgress),
        }
    }

    /// Use the given execution strategy.
    pub fn with_computer(mut self, computer: Computer) -> Self {
        self.computer = computer;
        self
    }

    /// Route progress and log output to the given sink.
    pub fn with_indicator(mut self, indicator: Box<dyn ProgressIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    // -----------------------------------------------------------------
    // Terminal operations

    /// Match the rows of this matcher's two tables pairwise.
    ///
    /// Each output link joins one row from each table and carries its
    /// score; `mode` selects which of several candidate matches per row
    /// are retained. At least one table must be random-access.
    pub fn find_pair_matches(&self, mode: PairMode) -> Result<LinkSet> {
        if self.tables.len() != 2 {
            return Err(Error::Config(format!(
                "pair match needs exactly 2 tables, got {}",
                self.tables.len()
            )));
        }
        self.check_column_counts()?;
        let started = self.start_match()?;
        let result = match mode {
            PairMode::All => self.find_all_pairs(0, 1)?,
            PairMode::Best => {
                let pairs = self.find_all_pairs(0, 1)?;
                self.eliminate_multiple_row_entries(pairs)?
            }
            PairMode::Best1 => self.find_directed_best(1, 0)?,
            PairMode::Best2 => self.find_directed_best(0, 1)?,
        };
        self.end_match(started)?;
        Ok(result)
    }

    /// Match rows across all of this matcher's tables into groups.
    ///
    /// Every output link is the transitive closure of pairwise matches,
    /// holds at most one row per table, and no row appears in more than
    /// one link. All tables must be random-access.
    pub fn find_group_matches(&self, join_types: &[MultiJoinType]) -> Result<LinkSet> {
        if self.tables.len() < 2 {
            return Err(Error::Config(format!(
                "group match needs at least 2 tables, got {}",
                self.tables.len()
            )));
        }
        self.check_join_arity(join_types)?;
        self.check_random()?;
        self.check_column_counts()?;
        let started = self.start_match()?;

        let n = self.tables.len();
        let (filters, all_empty) = match self.group_regions()? {
            Some(regions) => regions,
            None => (vec![pass_all(); n], false),
        };
        let mut links = if all_empty {
            self.indicator
                .log_message("No region overlap - matches not possible")?;
            LinkSet::new()
        } else {
            let possible = self.all_possible_links(&filters)?;
            let mut pairs = self.find_pairs(possible)?;
            self.eliminate_internal(&mut pairs)?;
            let mut links = self.agglomerate(pairs)?;
            // Merging components can reintroduce same-table duplicates.
            self.eliminate_internal(&mut links)?;
            links
        };

        self.add_missing_singles(&mut links, join_types)?;
        links.retain(|link| Self::accept_row(link, join_types, n));
        self.end_match(started)?;
        Ok(links)
    }

    /// Find groups of matching rows within this matcher's sole table.
    ///
    /// With `include_singles`, rows that match nothing appear in the
    /// output as singleton links.
    pub fn find_internal_matches(&self, include_singles: bool) -> Result<LinkSet> {
        if self.tables.len() != 1 {
            return Err(Error::Config(format!(
                "internal match needs exactly 1 table, got {}",
                self.tables.len()
            )));
        }
        self.check_random()?;
        let started = self.start_match()?;

        let table = self.tables[0];
        let nrow = table.row_count();
        let collector = BinIndexCollector {
            engine: self.engine,
            filter: pass_all(),
            row_count: nrow,
        };
        let mut binned = self.computer.collect(
            &collector,
            table,
            &*self.indicator,
            "Binning rows for table 1",
        )?;
        if nrow > 0 {
            self.indicator.log_message(&format!(
                "Average bin count per row: {:.2}",
                binned.binner.bin_count() as f64 / nrow as f64
            ))?;
        }
        let possible = self.bins_to_internal_links(&mut binned.binner, 0)?;
        let pairs = self.find_pairs(possible)?;
        let mut links = self.agglomerate(pairs)?;
        if include_singles {
            for single in self.missing_singles(&links, 0)? {
                links.insert(single);
            }
        }
        self.end_match(started)?;
        Ok(links)
    }

    /// Match each row of a designated reference table against rows of
    /// all the other tables.
    ///
    /// Each output link is a hub: one reference row plus its scored
    /// partners (optionally only the best per partner table). Partner
    /// rows are associated with the reference row, never with each
    /// other. All tables must be random-access.
    pub fn find_multi_pair_matches(
        &self,
        index0: usize,
        best_only: bool,
        join_types: &[MultiJoinType],
    ) -> Result<LinkSet> {
        let n = self.tables.len();
        if n < 2 {
            return Err(Error::Config(format!(
                "multi-pair match needs at least 2 tables, got {n}"
            )));
        }
        if index0 >= n {
            return Err(Error::Config(format!(
                "reference table index {index0} out of range for {n} tables"
            )));
        }
        self.check_join_arity(join_types)?;
        self.check_random()?;
        self.check_column_counts()?;
        let started = self.start_match()?;

        let (filter, empty) = self.multi_pair_region(index0)?;
        let mut links = if empty {
            self.indicator
                .log_message("No region overlap - matches not possible")?;
            LinkSet::new()
        } else {
            let possible = self.possible_multi_pair_links(index0, &filter)?;
            self.find_multi_pairs(possible, index0, best_only)?
        };

        self.add_missing_singles(&mut links, join_types)?;
        links.retain(|link| Self::accept_row(link, join_types, n));
        self.end_match(started)?;
        Ok(links)
    }

    // -----------------------------------------------------------------
    // Configuration checks and bookkeeping

    fn check_random(&self) -> Result<()> {
        for (i, table) in self.tables.iter().enumerate() {
            if !table.is_random() {
                return Err(Error::NonRandomTable(i));
            }
        }
        Ok(())
    }

    fn check_column_counts(&self) -> Result<()> {
        let ncol = self.tables[0].column_count();
        for (i, table) in self.tables.iter().enumerate().skip(1) {
            if table.column_count() != ncol {
                return Err(Error::Config(format!(
                    "column count mismatch: table 1 has {ncol}, table {} has {}",
                    i + 1,
                    table.column_count()
                )));
            }
        }
        Ok(())
    }

    fn check_join_arity(&self, join_types: &[MultiJoinType]) -> Result<()> {
        if join_types.len() != self.tables.len() {
            return Err(Error::Config(format!(
                "join type count {} differs from table count {}",
                join_types.len(),
                self.tables.len()
            )));
        }
        Ok(())
    }

    fn start_match(&self) -> Result<Instant> {
        self.indicator
            .log_message(&format!("Match criteria: {}", self.engine.description()))?;
        self.indicator
            .log_message(&format!("Processing: {}", self.computer.description()))?;
        Ok(Instant::now())
    }

    fn end_match(&self, started: Instant) -> Result<()> {
        self.indicator.log_message(&format!(
            "Elapsed time for match: {:.1} seconds",
            started.elapsed().as_secs_f64()
        ))
    }

    // -----------------------------------------------------------------
    // Range and coverage pruning

    /// Read the broadened coverage of each listed table.
    fn read_coverages(&self, indices: &[usize]) -> Result<Vec<E::Cov>> {
        self.indicator
            .log_message("Attempting to locate a restricted common region")?;
        let mut covs = Vec::with_capacity(indices.len());
        for &i in indices {
            let collector = CoverageCollector {
                engine: self.engine,
            };
            let cov = self.computer.collect(
                &collector,
                self.tables[i],
                &*self.indicator,
                &format!("Assessing coverage of table {}", i + 1),
            )?;
            self.indicator.log_message(&format!(
                "Coverage of table {}: {}",
                i + 1,
                cov.describe()
            ))?;
            covs.push(cov);
        }
        Ok(covs)
    }

    /// Read the observed per-column value range of each listed table.
    ///
    /// Columns holding mutually incomparable values fall back to
    /// unbounded; matching proceeds without that part of the
    /// optimization.
    fn read_ranges(&self, indices: &[usize]) -> Result<Vec<NdRange>> {
        let mut ranges = Vec::with_capacity(indices.len());
        for &i in indices {
            let collector = RangeCollector {
                ncol: self.tables[i].column_count(),
            };
            let acc = self.computer.collect(
                &collector,
                self.tables[i],
                &*self.indicator,
                &format!("Assessing range of coordinates from table {}", i + 1),
            )?;
            if acc.n_incomparable > 0 {
                log::warn!(
                    "table {}: mutually incomparable column values; \
                     affected axes left unbounded",
                    i + 1
                );
                self.indicator.log_message(&format!(
                    "Table {}: incomparable values, range bounding degraded",
                    i + 1
                ))?;
            }
            ranges.push(acc.into_range());
        }
        Ok(ranges)
    }

    /// Common match region of two tables, with in-region row counts for
    /// choosing which table gets binned.
    fn pair_intersection(&self, i1: usize, i2: usize) -> Result<Intersection> {
        if self.engine.new_coverage().is_some() {
            let covs = self.read_coverages(&[i1, i2])?;
            let mut common = covs[0].clone();
            common.intersection(&covs[1]);
            if common.is_empty() {
                self.indicator
                    .log_message("No region overlap - matches not possible")?;
                return Ok(Intersection::empty());
            }
            self.indicator.log_message(&format!(
                "Potential match region: {}",
                common.describe()
            ))?;
            self.count_in_region(common.tester(), &[i1, i2])
        } else if self.engine.can_bound_match() {
            let ranges = self.read_ranges(&[i1, i2])?;
            let broadened: Vec<NdRange> = (0..2)
                .map(|j| self.engine.match_bounds(&ranges, j))
                .collect();
            match broadened[0].intersection(&broadened[1]) {
                None => {
                    self.indicator
                        .log_message("No region overlap - matches not possible")?;
                    Ok(Intersection::empty())
                }
                Some(common) if common.is_bounded() => {
                    self.count_in_region(range_filter(common), &[i1, i2])
                }
                Some(_) => Ok(Intersection::full(self.row_counts(&[i1, i2]))),
            }
        } else {
            Ok(Intersection::full(self.row_counts(&[i1, i2])))
        }
    }

    fn row_counts(&self, indices: &[usize]) -> Vec<u64> {
        indices.iter().map(|&i| self.tables[i].row_count()).collect()
    }

    fn count_in_region(
        &self,
        filter: RowFilter,
        indices: &[usize],
    ) -> Result<Intersection> {
        let mut counts = Vec::with_capacity(indices.len());
        for &i in indices {
            let collector = CountCollector {
                filter: filter.clone(),
            };
            let n = self.computer.collect(
                &collector,
                self.tables[i],
                &*self.indicator,
                &format!("Counting rows in match region for table {}", i + 1),
            )?;
            self.indicator
                .log_message(&format!("{n} rows in match region for table {}", i + 1))?;
            counts.push(n);
        }
        Ok(Intersection {
            filter,
            empty: false,
            counts,
        })
    }

    /// Per-table row filters for group matching: a row of table `i` is
    /// worth binning only if it lies in the broadened region of some
    /// other table. Returns `None` when the engine supports no bounding;
    /// the flag is `true` when every region is empty, i.e. no two tables
    /// overlap at all.
    fn group_regions(&self) -> Result<Option<(Vec<RowFilter>, bool)>> {
        let n = self.tables.len();
        if self.engine.new_coverage().is_some() {
            let indices: Vec<usize> = (0..n).collect();
            let covs = self.read_coverages(&indices)?;
            let mut filters = Vec::with_capacity(n);
            let mut any = false;
            for i in 0..n {
                let mut region = covs[i].clone();
                if let Some(others) = union_excluding(&covs, i) {
                    region.intersection(&others);
                }
                if region.is_empty() {
                    filters.push(never());
                } else {
                    any = true;
                    filters.push(region.tester());
                }
            }
            Ok(Some((filters, !any)))
        } else if self.engine.can_bound_match() {
            let indices: Vec<usize> = (0..n).collect();
            let ranges = self.read_ranges(&indices)?;
            let broadened: Vec<NdRange> = (0..n)
                .map(|i| self.engine.match_bounds(&ranges, i))
                .collect();
            let mut filters = Vec::with_capacity(n);
            let mut any = false;
            for i in 0..n {
                let others = broadened
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, r)| r)
                    .fold(None::<NdRange>, |acc, r| {
                        Some(match acc {
                            None => r.clone(),
                            Some(u) => u.union(r),
                        })
                    });
                let region = match &others {
                    Some(u) => broadened[i].intersection(u),
                    None => Some(broadened[i].clone()),
                };
                match region {
                    None => filters.push(never()),
                    Some(r) if r.is_bounded() => {
                        any = true;
                        filters.push(range_filter(r));
                    }
                    Some(_) => {
                        any = true;
                        filters.push(pass_all());
                    }
                }
            }
            Ok(Some((filters, !any)))
        } else {
            Ok(None)
        }
    }

    /// Shared row filter for multi-pair matching: the reference table's
    /// region intersected with the union of all the others.
    fn multi_pair_region(&self, index0: usize) -> Result<(RowFilter, bool)> {
        let n = self.tables.len();
        if self.engine.new_coverage().is_some() {
            let indices: Vec<usize> = (0..n).collect();
            let covs = self.read_coverages(&indices)?;
            let mut region = covs[index0].clone();
            if let Some(others) = union_excluding(&covs, index0) {
                region.intersection(&others);
            }
            if region.is_empty() {
                Ok((never(), true))
            } else {
                self.indicator.log_message(&format!(
                    "Potential match region: {}",
                    region.describe()
                ))?;
                Ok((region.tester(), false))
            }
        } else if self.engine.can_bound_match() {
            let indices: Vec<usize> = (0..n).collect();
            let ranges = self.read_ranges(&indices)?;
            let broadened: Vec<NdRange> = (0..n)
                .map(|i| self.engine.match_bounds(&ranges, i))
                .collect();
            let others = broadened
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != index0)
                .map(|(_, r)| r)
                .fold(None::<NdRange>, |acc, r| {
                    Some(match acc {
                        None => r.clone(),
                        Some(u) => u.union(r),
                    })
                });
            let region = match &others {
                Some(u) => broadened[index0].intersection(u),
                None => Some(broadened[index0].clone()),
            };
            match region {
                None => Ok((never(), true)),
                Some(r) if r.is_bounded() => Ok((range_filter(r), false)),
                Some(_) => Ok((pass_all(), false)),
            }
        } else {
            Ok((pass_all(), false))
        }
    }

    // -----------------------------------------------------------------
    // Pairwise scanning

    /// All inter-table pairs between two tables, with automatic choice
    /// of which table gets binned.
    fn find_all_pairs(&self, i1: usize, i2: usize) -> Result<LinkSet> {
        let random1 = self.tables[i1].is_random();
        let random2 = self.tables[i2].is_random();
        if !random1 && !random2 {
            return Err(Error::Config(
                "neither table provides random access".to_owned(),
            ));
        }
        if random1 && random2 {
            let inter = self.pair_intersection(i1, i2)?;
            if inter.empty {
                return Ok(LinkSet::new());
            }
            // Bin the table with fewer in-range rows; the binner's
            // memory footprint scales with it.
            let (index_r, index_s) = if inter.counts[0] < inter.counts[1] {
                (i1, i2)
            } else {
                (i2, i1)
            };
            self.scan_for_pairs(index_r, index_s, &inter.filter, false)
        } else if random1 {
            self.scan_for_pairs(i1, i2, &pass_all(), false)
        } else {
            self.scan_for_pairs(i2, i1, &pass_all(), false)
        }
    }

    /// Best match per row of the sequentially scanned table `index_s`.
    fn find_directed_best(&self, index_r: usize, index_s: usize) -> Result<LinkSet> {
        if !self.tables[index_r].is_random() {
            return Err(Error::NonRandomTable(index_r));
        }
        let inter = if self.tables[index_s].is_random() {
            self.pair_intersection(index_r, index_s)?
        } else {
            Intersection::full(Vec::new())
        };
        if inter.empty {
            return Ok(LinkSet::new());
        }
        self.scan_for_pairs(index_r, index_s, &inter.filter, true)
    }

    /// Bin the random table's row indices, then scan the sequential
    /// table against them (the two phases of the pairwise algorithm).
    fn scan_for_pairs(
        &self,
        index_r: usize,
        index_s: usize,
        filter: &RowFilter,
        best_only: bool,
    ) -> Result<LinkSet> {
        let table_r = self.tables[index_r];
        if !table_r.is_random() {
            return Err(Error::NonRandomTable(index_r));
        }
        let nrow_r = table_r.row_count();
        let bin_collector = BinIndexCollector {
            engine: self.engine,
            filter: filter.clone(),
            row_count: nrow_r,
        };
        let binned = self.computer.collect(
            &bin_collector,
            table_r,
            &*self.indicator,
            &format!("Binning rows for table {}", index_r + 1),
        )?;
        if binned.n_exclude > 0 {
            self.indicator.log_message(&format!(
                "{}/{} rows excluded (out of match region)",
                binned.n_exclude, nrow_r
            ))?;
        }
        let n_bin = binned.binner.bin_count();
        self.indicator.log_message(&format!(
            "{} row refs for {} rows in {} bins",
            binned.n_ref, nrow_r, n_bin
        ))?;
        if n_bin > 0 {
            self.indicator.log_message(&format!(
                "(average bin occupancy {:.2})",
                binned.n_ref as f64 / n_bin as f64
            ))?;
        }

        let scan_collector = PairScanCollector {
            engine: self.engine,
            filter: filter.clone(),
            table_r,
            index_r: index_r as u32,
            index_s: index_s as u32,
            best_only,
            binner_r: &binned.binner,
        };
        let scanned = self.computer.collect(
            &scan_collector,
            self.tables[index_s],
            &*self.indicator,
            &format!("Scanning rows for table {}", index_s + 1),
        )?;
        Ok(scanned.links)
    }

    /// Keep each row in at most one pair: rank pairs by ascending score
    /// and keep one only while neither of its rows is already claimed.
    fn eliminate_multiple_row_entries(&self, mut pairs: LinkSet) -> Result<LinkSet> {
        let mut ranked: Vec<RowLink> = pairs.drain().collect();
        // Ties resolve by ref order so the outcome is deterministic.
        ranked.sort_by(|a, b| {
            let sa = a.score().unwrap_or(f64::MAX);
            let sb = b.score().unwrap_or(f64::MAX);
            sa.total_cmp(&sb).then_with(|| a.cmp(b))
        });

        let mut seen: HashSet<RowRef> = HashSet::new();
        let mut out = LinkSet::new();
        let mut tracker = ProgressTracker::new(
            &*self.indicator,
            ranked.len() as u64,
            "Eliminating multiple row references",
        )?;
        for link in ranked {
            debug_assert_eq!(link.len(), 2);
            debug_assert!(link.score().is_some());
            let (a, b) = (link.refs()[0], link.refs()[1]);
            let new_a = seen.insert(a);
            let new_b = seen.insert(b);
            if new_a && new_b {
                out.insert(link);
            }
            tracker.tick()?;
        }
        tracker.close()?;
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Candidate groups and scoring

    /// Score every within-group pair of a set of candidate links.
    ///
    /// The input set is drained as it is consumed. Internal (same-table)
    /// pairs are scored like any other; group mode strips them later.
    fn find_pairs(&self, mut possible: LinkSet) -> Result<LinkSet> {
        let mut out = LinkSet::new();
        let mut kit = self.engine.create_kit();
        let mut accesses = self.row_accesses()?;
        let mut tracker = ProgressTracker::new(
            &*self.indicator,
            possible.len() as u64,
            "Locating pairs",
        )?;
        for link in possible.drain() {
            if link.len() > 1 {
                let rows = fetch_rows(&mut accesses, &link)?;
                let refs = link.refs();
                for i in 0..refs.len() {
                    for j in 0..i {
                        let probe = RowLink::group([refs[i], refs[j]]);
                        if !out.contains(&probe) {
                            if let Some(score) = kit.match_score(&rows[i], &rows[j]) {
                                out.insert(RowLink::pair(refs[i], refs[j], score));
                            }
                        }
                    }
                }
            }
            tracker.tick()?;
        }
        tracker.close()?;
        Ok(out)
    }

    /// Bin the refs of every table into one shared cross-table binner
    /// and turn multiply occupied bins into candidate links.
    fn all_possible_links(&self, filters: &[RowFilter]) -> Result<LinkSet> {
        let mut binner: ObjectBinner<E::Key, RowRef> = ObjectBinner::new();
        let mut total_rows = 0u64;
        for (itab, table) in self.tables.iter().enumerate() {
            let collector = BinRefCollector {
                engine: self.engine,
                filter: filters[itab].clone(),
                table_index: itab as u32,
                allowed: None,
            };
            let binned = self.computer.collect(
                &collector,
                *table,
                &*self.indicator,
                &format!("Binning rows for table {}", itab + 1),
            )?;
            let nrow = table.row_count();
            let n_exclude = nrow - binned.n_include;
            if n_exclude > 0 {
                self.indicator.log_message(&format!(
                    "{n_exclude}/{nrow} rows excluded (out of match region)"
                ))?;
            }
            binner = binner.combine(binned.binner);
            total_rows += nrow;
        }
        if total_rows > 0 {
            self.indicator.log_message(&format!(
                "Average bin count per row: {:.2}",
                binner.bin_count() as f64 / total_rows as f64
            ))?;
        }
        self.bins_to_links(&mut binner)
    }

    /// Like [`Self::all_possible_links`] but restricted to links that
    /// can involve the reference table: other tables only populate bins
    /// the reference table has already seeded.
    fn possible_multi_pair_links(
        &self,
        index0: usize,
        filter: &RowFilter,
    ) -> Result<LinkSet> {
        let mut binner: ObjectBinner<E::Key, RowRef> = ObjectBinner::new();
        {
            let collector = BinRefCollector {
                engine: self.engine,
                filter: filter.clone(),
                table_index: index0 as u32,
                allowed: None,
            };
            let binned = self.computer.collect(
                &collector,
                self.tables[index0],
                &*self.indicator,
                &format!("Binning rows for table {}", index0 + 1),
            )?;
            binner = binner.combine(binned.binner);
        }
        for (itab, table) in self.tables.iter().enumerate() {
            if itab == index0 {
                continue;
            }
            let collector = BinRefCollector {
                engine: self.engine,
                filter: filter.clone(),
                table_index: itab as u32,
                allowed: Some(&binner),
            };
            let binned = self.computer.collect(
                &collector,
                *table,
                &*self.indicator,
                &format!("Binning rows for table {}", itab + 1),
            )?;
            binner = binner.combine(binned.binner);
        }
        self.bins_to_links(&mut binner)
    }

    /// Score candidate pairs touching the reference table and regroup
    /// them into one hub link per reference row.
    fn find_multi_pairs(
        &self,
        mut possible: LinkSet,
        index0: usize,
        best_only: bool,
    ) -> Result<LinkSet> {
        let mut pairs = LinkSet::new();
        let mut kit = self.engine.create_kit();
        let mut accesses = self.row_accesses()?;
        let mut tracker = ProgressTracker::new(
            &*self.indicator,
            possible.len() as u64,
            &format!(
                "Locating pair matches between table {} and other tables",
                index0 + 1
            ),
        )?;
        for link in possible.drain() {
            let has_others = link
                .refs()
                .iter()
                .any(|r| r.table as usize != index0);
            if link.len() > 1 && has_others {
                let rows = fetch_rows(&mut accesses, &link)?;
                let refs = link.refs();
                for (i0, &ref0) in refs.iter().enumerate() {
                    if ref0.table as usize != index0 {
                        continue;
                    }
                    for (i1, &ref1) in refs.iter().enumerate() {
                        if ref1.table as usize == index0 {
                            continue;
                        }
                        let probe = RowLink::group([ref0, ref1]);
                        if !pairs.contains(&probe) {
                            if let Some(score) = kit.match_score(&rows[i0], &rows[i1]) {
                                pairs.insert(RowLink::pair(ref0, ref1, score));
                            }
                        }
                    }
                }
            }
            tracker.tick()?;
        }
        tracker.close()?;

        // Regroup the scored pairs around their reference-table row.
        let mut pair_binner: ObjectBinner<RowRef, ScoredRef> = ObjectBinner::new();
        for link in pairs.drain() {
            let (Some(score), &[a, b]) = (link.score(), link.refs()) else {
                continue;
            };
            let (hub, partner) = if a.table as usize == index0 {
                (a, b)
            } else {
                (b, a)
            };
            pair_binner.add_item(hub, ScoredRef {
                target: partner,
                score,
            });
        }
        let mut out = LinkSet::new();
        for (hub, mut partners) in pair_binner.drain() {
            if best_only {
                partners = best_per_table(partners);
            }
            out.insert(RowLink::hub(hub, partners));
        }
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Link-set post-processing

    fn bins_to_links(&self, binner: &mut ObjectBinner<E::Key, RowRef>) -> Result<LinkSet> {
        let n_ref = binner.item_count();
        let n_bin = binner.bin_count();
        self.indicator
            .log_message(&format!("{n_ref} row refs in {n_bin} bins"))?;
        if n_bin > 0 {
            self.indicator.log_message(&format!(
                "(average bin occupancy {:.2})",
                n_ref as f64 / n_bin as f64
            ))?;
        }
        let mut tracker = ProgressTracker::new(
            &*self.indicator,
            n_bin,
            "Consolidating potential match groups",
        )?;
        let mut links = LinkSet::new();
        for (_key, refs) in binner.drain() {
            if refs.len() > 1 {
                links.insert(RowLink::group(refs));
            }
            tracker.tick()?;
        }
        tracker.close()?;
        Ok(links)
    }

    fn bins_to_internal_links(
        &self,
        binner: &mut LongBinner<E::Key>,
        itable: usize,
    ) -> Result<LinkSet> {
        let mut tracker = ProgressTracker::new(
            &*self.indicator,
            binner.bin_count(),
            "Consolidating potential match groups",
        )?;
        let mut links = LinkSet::new();
        for (_key, rows) in binner.drain() {
            if rows.len() > 1 {
                links.insert(RowLink::group(
                    rows.into_iter().map(|row| RowRef::new(itable as u32, row)),
                ));
            }
            tracker.tick()?;
        }
        tracker.close()?;
        Ok(links)
    }

    fn agglomerate(&self, pairs: LinkSet) -> Result<LinkSet> {
        self.indicator.start_stage("Agglomerating links")?;
        let links = agglomerate::agglomerate_links(pairs);
        self.indicator.end_stage()?;
        Ok(links)
    }

    fn eliminate_internal(&self, links: &mut LinkSet) -> Result<()> {
        self.indicator.start_stage("Eliminating internal links")?;
        let (n_replaced, n_removed) = agglomerate::eliminate_internal_links(links);
        self.indicator.end_stage()?;
        if n_replaced > 0 {
            self.indicator
                .log_message(&format!("Internal links replaced: {n_replaced}"))?;
        }
        if n_removed > 0 {
            self.indicator
                .log_message(&format!("Internal links removed: {n_removed}"))?;
        }
        Ok(())
    }

    fn add_missing_singles(
        &self,
        links: &mut LinkSet,
        join_types: &[MultiJoinType],
    ) -> Result<()> {
        for (i, join_type) in join_types.iter().enumerate() {
            if *join_type == MultiJoinType::Always {
                for single in self.missing_singles(links, i)? {
                    links.insert(single);
                }
            }
        }
        Ok(())
    }

    /// Singleton links for rows of one table absent from a link set.
    fn missing_singles(&self, links: &LinkSet, itable: usize) -> Result<Vec<RowLink>> {
        let nrow = self.tables[itable].row_count();
        let n = usize::try_from(nrow).map_err(|_| {
            Error::Config(format!(
                "table {} too large for singleton synthesis",
                itable + 1
            ))
        })?;
        let mut present = vec![0u64; n.div_ceil(64)];
        for link in links.iter() {
            for r in link.refs() {
                if r.table as usize == itable {
                    let i = r.row as usize;
                    present[i / 64] |= 1 << (i % 64);
                }
            }
        }
        let mut singles = Vec::new();
        for i in 0..n {
            if present[i / 64] & (1 << (i % 64)) == 0 {
                singles.push(RowLink::single(RowRef::new(itable as u32, i as u64)));
            }
        }
        Ok(singles)
    }

    fn accept_row(link: &RowLink, join_types: &[MultiJoinType], ntable: usize) -> bool {
        let mut present = vec![false; ntable];
        for r in link.refs() {
            present[r.table as usize] = true;
        }
        MultiJoinType::accept(join_types, &present)
    }

    fn row_accesses(&self) -> Result<Vec<Box<dyn RowAccess + Send + 'a>>> {
        self.tables.iter().map(|t| t.row_access()).collect()
    }
}

/// Union of all coverages except the one at `skip`.
fn union_excluding<C: Coverage>(covs: &[C], skip: usize) -> Option<C> {
    let mut result: Option<C> = None;
    for (i, cov) in covs.iter().enumerate() {
        if i == skip {
            continue;
        }
        match &mut result {
            None => result = Some(cov.clone()),
            Some(u) => u.union(cov),
        }
    }
    result
}
