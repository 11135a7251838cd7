//! Execution configuration.
//!
//! All parameters have defaults that behave well on catalog-scale data.

use serde::{Deserialize, Serialize};

/// Ceiling on the default worker count.
///
/// Not every matching step parallelises, so per Amdahl's law the returns
/// diminish quickly; past a handful of workers the extra accumulator
/// combination work can even slow things down. The value is somewhat
/// arbitrary but has survived experimentation.
pub const DEFAULT_PARALLELISM_LIMIT: usize = 6;

/// Tuning for the parallel execution strategy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads.
    /// Default: `min(6, available_parallelism)`.
    pub workers: usize,

    /// Smallest number of rows worth handing to a worker as one block;
    /// tables shorter than two blocks are processed sequentially.
    /// Default: 8192.
    pub min_block_rows: u64,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers: cores.min(DEFAULT_PARALLELISM_LIMIT),
            min_block_rows: 8192,
        }
    }
}

impl ParallelConfig {
    /// Config with an explicit worker count and default block size.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            ..Self::default()
        }
    }

    /// Block size for a table of `row_count` rows: large enough to keep
    /// per-block overhead negligible, small enough to give each worker
    /// several blocks for load balancing.
    pub(crate) fn block_rows(&self, row_count: u64) -> u64 {
        let target = row_count / (self.workers.max(1) as u64 * 4);
        target.max(self.min_block_rows).max(1)
    }
}
