//! Execution-strategy and pruning equivalence properties.

mod common;

use common::{normalize, random_table, ref_sets};
use milan_match::bins::LongBinner;
use milan_match::coverage::NoCoverage;
use milan_match::harness::{CartesianEngine, CartesianKit, CellKey, MemoryTable};
use milan_match::{
    Computer, Datum, Error, InterruptibleProgress, MatchEngine, MatchKit,
    MultiJoinType, NdRange, NullProgress, PairMode, ParallelConfig, RowMatcher,
    Table,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Delegates matching to a Cartesian engine but advertises no coverage
/// or range bounding, so every pruning optimization is disabled.
struct UnprunedEngine(CartesianEngine);

impl MatchEngine for UnprunedEngine {
    type Key = CellKey;
    type Kit = CartesianKit;
    type Cov = NoCoverage;

    fn description(&self) -> String {
        format!("{} (unpruned)", self.0.description())
    }

    fn create_kit(&self) -> CartesianKit {
        self.0.create_kit()
    }
}

fn parallel_computer() -> Computer {
    Computer::Parallel(ParallelConfig {
        workers: 4,
        // Small blocks so even test-sized tables really get split.
        min_block_rows: 64,
    })
}

#[test]
fn test_sequential_and_parallel_pair_matches_agree() {
    let mut rng = StdRng::seed_from_u64(42);
    let a = random_table(&mut rng, 1500, 2, 20.0);
    let b = random_table(&mut rng, 1200, 2, 20.0);
    let engine = CartesianEngine::new(2, 0.4);
    let tables: [&dyn Table; 2] = [&a, &b];

    let sequential = RowMatcher::new(&engine, &tables)
        .find_pair_matches(PairMode::All)
        .unwrap();
    let parallel = RowMatcher::new(&engine, &tables)
        .with_computer(parallel_computer())
        .find_pair_matches(PairMode::All)
        .unwrap();

    assert!(!sequential.is_empty());
    assert_eq!(normalize(&sequential), normalize(&parallel));
}

#[test]
fn test_sequential_and_parallel_internal_matches_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    let table = random_table(&mut rng, 2000, 1, 50.0);
    let engine = CartesianEngine::new(1, 0.05);
    let tables: [&dyn Table; 1] = [&table];

    let sequential = RowMatcher::new(&engine, &tables)
        .find_internal_matches(true)
        .unwrap();
    let parallel = RowMatcher::new(&engine, &tables)
        .with_computer(parallel_computer())
        .find_internal_matches(true)
        .unwrap();

    assert_eq!(ref_sets(&sequential), ref_sets(&parallel));
}

#[test]
fn test_bin_scan_equals_brute_force() {
    let mut rng = StdRng::seed_from_u64(11);
    let a = random_table(&mut rng, 400, 2, 10.0);
    let b = random_table(&mut rng, 500, 2, 10.0);
    let engine = CartesianEngine::new(2, 0.3);
    let tables: [&dyn Table; 2] = [&a, &b];

    let links = RowMatcher::new(&engine, &tables)
        .find_pair_matches(PairMode::All)
        .unwrap();
    let scanned = normalize(&links);

    // O(N*M) reference scoring over the same rows.
    let mut kit = engine.create_kit();
    let mut expected: Vec<(Vec<(u32, u64)>, Option<i64>)> = Vec::new();
    let read = |table: &MemoryTable| -> Vec<Vec<Datum>> {
        let mut access = table.row_access().unwrap();
        (0..table.row_count())
            .map(|i| access.row(i).unwrap().to_vec())
            .collect()
    };
    let rows_a = read(&a);
    let rows_b = read(&b);
    for (ia, row_a) in rows_a.iter().enumerate() {
        for (ib, row_b) in rows_b.iter().enumerate() {
            if let Some(score) = kit.match_score(row_a, row_b) {
                expected.push((
                    vec![(0, ia as u64), (1, ib as u64)],
                    Some((score * 1e9).round() as i64),
                ));
            }
        }
    }
    expected.sort();

    assert!(!scanned.is_empty());
    assert_eq!(scanned, expected);
}

#[test]
fn test_pruning_never_changes_the_result() {
    let mut rng = StdRng::seed_from_u64(5);
    // Partially overlapping tables so range pruning has rows to drop.
    let a = random_table(&mut rng, 600, 1, 10.0);
    let mut b = random_table(&mut rng, 600, 1, 10.0);
    for _ in 0..200 {
        b.add_row(vec![Datum::Real(100.0 + rng.gen::<f64>() * 10.0)])
            .unwrap();
    }

    let pruned_engine = CartesianEngine::new(1, 0.2);
    let unpruned_engine = UnprunedEngine(CartesianEngine::new(1, 0.2));
    let tables: [&dyn Table; 2] = [&a, &b];

    let pruned = RowMatcher::new(&pruned_engine, &tables)
        .find_pair_matches(PairMode::All)
        .unwrap();
    let unpruned = RowMatcher::new(&unpruned_engine, &tables)
        .find_pair_matches(PairMode::All)
        .unwrap();
    assert!(!pruned.is_empty());
    assert_eq!(normalize(&pruned), normalize(&unpruned));

    // Same for group mode, where pruning is per-table.
    let join = [MultiJoinType::Always, MultiJoinType::Always];
    let pruned = RowMatcher::new(&pruned_engine, &tables)
        .find_group_matches(&join)
        .unwrap();
    let unpruned = RowMatcher::new(&unpruned_engine, &tables)
        .find_group_matches(&join)
        .unwrap();
    assert_eq!(ref_sets(&pruned), ref_sets(&unpruned));
}

#[test]
fn test_best_mode_never_repeats_a_row() {
    // Clustered points with exact score ties; whatever the tie-break,
    // no row may appear in two kept pairs.
    let mut rng = StdRng::seed_from_u64(23);
    let mut rows_a = Vec::new();
    let mut rows_b = Vec::new();
    for _ in 0..300 {
        let center = rng.gen::<f64>() * 30.0;
        rows_a.push(vec![Datum::Real(center)]);
        rows_b.push(vec![Datum::Real(center + 0.1)]);
        rows_b.push(vec![Datum::Real(center - 0.1)]);
    }
    let a = MemoryTable::from_rows(rows_a).unwrap();
    let b = MemoryTable::from_rows(rows_b).unwrap();
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];

    let links = RowMatcher::new(&engine, &tables)
        .find_pair_matches(PairMode::Best)
        .unwrap();
    let mut seen = std::collections::HashSet::new();
    for link in links.iter() {
        for r in link.refs() {
            assert!(seen.insert(*r), "row {r:?} kept in two pairs");
        }
    }
    assert!(!links.is_empty());
}

#[test]
fn test_binner_combine_split_independence() {
    // 100k insertions with overlapping key sets, split across two
    // binners, must combine to exactly the single-binner result.
    let mut rng = StdRng::seed_from_u64(99);
    let inserts: Vec<(u32, u64)> = (0..100_000)
        .map(|i| (rng.gen_range(0..10_000u32), i))
        .collect();

    let mut whole: LongBinner<u32> = LongBinner::for_rows(100_000);
    for &(k, v) in &inserts {
        whole.add_item(k, v);
    }

    let split_at = rng.gen_range(20_000..80_000);
    let mut left: LongBinner<u32> = LongBinner::for_rows(100_000);
    let mut right: LongBinner<u32> = LongBinner::for_rows(100_000);
    for &(k, v) in &inserts[..split_at] {
        left.add_item(k, v);
    }
    for &(k, v) in &inserts[split_at..] {
        right.add_item(k, v);
    }
    let combined = left.combine(right);

    assert_eq!(combined.bin_count(), whole.bin_count());
    assert_eq!(combined.item_count(), whole.item_count());
    for key in 0..10_000u32 {
        let mut got: Vec<u64> =
            combined.get(&key).map(|it| it.collect()).unwrap_or_default();
        let mut want: Vec<u64> =
            whole.get(&key).map(|it| it.collect()).unwrap_or_default();
        got.sort_unstable();
        want.sort_unstable();
        assert_eq!(got, want);
    }
}

#[test]
fn test_interruption_aborts_with_no_result() {
    let mut rng = StdRng::seed_from_u64(3);
    let a = random_table(&mut rng, 2000, 1, 100.0);
    let b = random_table(&mut rng, 2000, 1, 100.0);
    let engine = CartesianEngine::new(1, 0.01);
    let tables: [&dyn Table; 2] = [&a, &b];

    let progress = InterruptibleProgress::new(NullProgress);
    progress.trigger().store(true, std::sync::atomic::Ordering::Relaxed);
    let result = RowMatcher::new(&engine, &tables)
        .with_indicator(Box::new(progress))
        .find_pair_matches(PairMode::All);
    assert!(matches!(result, Err(Error::Interrupted)));

    // Parallel execution aborts the same way.
    let progress = InterruptibleProgress::new(NullProgress);
    progress.trigger().store(true, std::sync::atomic::Ordering::Relaxed);
    let result = RowMatcher::new(&engine, &tables)
        .with_computer(parallel_computer())
        .with_indicator(Box::new(progress))
        .find_pair_matches(PairMode::All);
    assert!(matches!(result, Err(Error::Interrupted)));
}

#[test]
fn test_match_bounds_fall_back_on_incomparable_columns() {
    // A text value alongside numbers poisons the observed range for
    // that axis; bounding degrades to unbounded and matching proceeds.
    let a = MemoryTable::from_rows(vec![
        vec![Datum::Real(0.0)],
        vec![Datum::Text("oops".to_owned())],
    ])
    .unwrap();
    let b = MemoryTable::of_reals(&[&[0.1]]);
    // Range-bounding path only (no coverage).
    struct RangeOnly(CartesianEngine);
    impl MatchEngine for RangeOnly {
        type Key = CellKey;
        type Kit = CartesianKit;
        type Cov = NoCoverage;
        fn description(&self) -> String {
            self.0.description()
        }
        fn create_kit(&self) -> CartesianKit {
            self.0.create_kit()
        }
        fn can_bound_match(&self) -> bool {
            true
        }
        fn match_bounds(&self, ranges: &[NdRange], index: usize) -> NdRange {
            self.0.match_bounds(ranges, index)
        }
    }
    let engine = RangeOnly(CartesianEngine::new(1, 0.5));
    let tables: [&dyn Table; 2] = [&a, &b];
    let links = RowMatcher::new(&engine, &tables)
        .find_pair_matches(PairMode::All)
        .unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0)]]);
}
