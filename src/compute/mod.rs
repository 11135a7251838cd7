//! Interchangeable execution strategies.
//!
//! Every bulk step of matching (binning, scanning, counting, range and
//! coverage accumulation) is expressed as a [`Collector`]: a factory for
//! private accumulators plus a per-row accumulation function and an
//! associative, commutative combiner. A [`Computer`] drives a collector
//! over a table either sequentially or by split-and-merge over row-range
//! blocks; both strategies produce identical results by construction.

mod collectors;
mod parallel;

pub(crate) use collectors::{
    BinIndexCollector, BinRefCollector, CountCollector, CoverageCollector,
    PairScanCollector, RangeCollector,
};

use crate::config::ParallelConfig;
use crate::error::Result;
use crate::progress::{ProgressIndicator, ProgressTracker};
use crate::table::{Datum, Table};

/// One bulk accumulation over a table's rows.
///
/// Accumulators are private to one execution unit: they may hold a
/// `MatchKit`, a row accessor, and scratch buffers without any locking.
/// [`Collector::combine`] must be associative and commutative so the
/// merged result is independent of how rows were split across units.
pub trait Collector: Sync {
    /// Accumulated state; moves from worker threads to the caller.
    type Accum: Send;

    /// Fresh accumulator for one execution unit.
    fn accumulator(&self) -> Result<Self::Accum>;

    /// Fold one row into an accumulator.
    fn accumulate(&self, index: u64, row: &[Datum], acc: &mut Self::Accum) -> Result<()>;

    /// Merge two accumulators built over disjoint row sets.
    fn combine(&self, a: Self::Accum, b: Self::Accum) -> Self::Accum;
}

/// Execution strategy for the bulk steps of a match.
#[derive(Clone, Debug, Default)]
pub enum Computer {
    /// Single-threaded streaming.
    #[default]
    Sequential,
    /// Recursive split over row ranges, merged across a worker pool.
    Parallel(ParallelConfig),
}

impl Computer {
    /// Parallel strategy with default tuning.
    pub fn parallel() -> Self {
        Computer::Parallel(ParallelConfig::default())
    }

    /// One-line summary for logging.
    pub fn description(&self) -> String {
        match self {
            Computer::Sequential => "sequential".to_owned(),
            Computer::Parallel(config) => {
                format!("parallel ({} workers)", config.workers)
            }
        }
    }

    /// Drive a collector over every row of a table.
    pub(crate) fn collect<C: Collector>(
        &self,
        collector: &C,
        table: &dyn Table,
        indicator: &dyn ProgressIndicator,
        stage: &str,
    ) -> Result<C::Accum> {
        match self {
            Computer::Sequential => {
                collect_sequential(collector, table, indicator, stage)
            }
            Computer::Parallel(config) => {
                // Short tables and non-random tables degrade to a single
                // streaming pass; the result is identical either way.
                let splittable = table.is_random()
                    && config.workers > 1
                    && table.row_count() >= config.min_block_rows * 2;
                if splittable {
                    parallel::collect_parallel(
                        config, collector, table, indicator, stage,
                    )
                } else {
                    collect_sequential(collector, table, indicator, stage)
                }
            }
        }
    }
}

/// Single-threaded driver: one accumulator, one streaming pass.
fn collect_sequential<C: Collector>(
    collector: &C,
    table: &dyn Table,
    indicator: &dyn ProgressIndicator,
    stage: &str,
) -> Result<C::Accum> {
    let mut acc = collector.accumulator()?;
    let mut tracker = ProgressTracker::new(indicator, table.row_count(), stage)?;
    let mut reader = table.read_rows()?;
    while reader.advance()? {
        collector.accumulate(reader.index(), reader.row(), &mut acc)?;
        tracker.tick()?;
    }
    tracker.close()?;
    Ok(acc)
}
