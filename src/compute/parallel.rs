//! Split/merge driver over a worker pool.
//!
//! A table's row range is cut into blocks which feed a channel; scoped
//! worker threads drain it, each folding rows into a private accumulator
//! through its own row accessor. Worker results merge pairwise at the
//! end. Because combination is associative and commutative, the merged
//! result does not depend on block granularity or scheduling order.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::Receiver;

use super::Collector;
use crate::config::ParallelConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressIndicator;
use crate::table::Table;

/// Progress and abort state shared by the workers of one stage.
struct SharedProgress<'a> {
    indicator: &'a dyn ProgressIndicator,
    total: u64,
    done: AtomicU64,
    aborted: AtomicBool,
}

impl<'a> SharedProgress<'a> {
    fn new(indicator: &'a dyn ProgressIndicator, total: u64) -> Self {
        Self {
            indicator,
            total,
            done: AtomicU64::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    /// Record `n` processed rows; the per-block interruption point.
    fn add(&self, n: u64) -> Result<()> {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        let fraction = if self.total > 0 {
            done as f64 / self.total as f64
        } else {
            1.0
        };
        match self.indicator.set_level(fraction) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }
}

pub(super) fn collect_parallel<C: Collector>(
    config: &ParallelConfig,
    collector: &C,
    table: &dyn Table,
    indicator: &dyn ProgressIndicator,
    stage: &str,
) -> Result<C::Accum> {
    let nrow = table.row_count();
    let block = config.block_rows(nrow);
    let nblocks = nrow.div_ceil(block);
    let nworkers = config.workers.min(nblocks as usize).max(1);

    indicator.start_stage(stage)?;
    let progress = SharedProgress::new(indicator, nrow);

    let (tx, rx) = crossbeam_channel::unbounded::<Range<u64>>();
    let mut start = 0;
    while start < nrow {
        let end = (start + block).min(nrow);
        // The receiver outlives this loop, so sending cannot fail.
        let _ = tx.send(start..end);
        start = end;
    }
    drop(tx);

    let results: Vec<Result<C::Accum>> = std::thread::scope(|scope| {
        let progress = &progress;
        let handles: Vec<_> = (0..nworkers)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || run_worker(collector, table, rx, progress))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    let mut merged: Option<C::Accum> = None;
    let mut first_error: Option<Error> = None;
    for result in results {
        match result {
            Ok(acc) => {
                merged = Some(match merged {
                    Some(m) => collector.combine(m, acc),
                    None => acc,
                });
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    indicator.end_stage()?;
    match merged {
        Some(acc) => Ok(acc),
        None => collector.accumulator(),
    }
}

/// One worker: drain blocks into a private accumulator.
fn run_worker<C: Collector>(
    collector: &C,
    table: &dyn Table,
    rx: Receiver<Range<u64>>,
    progress: &SharedProgress<'_>,
) -> Result<C::Accum> {
    let result = (|| {
        let mut acc = collector.accumulator()?;
        let mut access = table.row_access()?;
        while let Ok(block) = rx.recv() {
            if progress.aborted() {
                break;
            }
            let n = block.end - block.start;
            for index in block {
                let row = access.row(index)?;
                collector.accumulate(index, row, &mut acc)?;
            }
            progress.add(n)?;
        }
        Ok(acc)
    })();
    if result.is_err() {
        progress.abort();
    }
    result
}
