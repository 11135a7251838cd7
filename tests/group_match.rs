//! Group, internal, and multi-pair matching.

mod common;

use common::ref_sets;
use milan_match::harness::{CartesianEngine, MemoryTable};
use milan_match::{Error, MultiJoinType, RowMatcher, Table};

use MultiJoinType::{Always, Default, Match, NoMatch};

#[test]
fn test_group_match_agglomerates_transitively() {
    // A0-B0 and B0-C0 are within tolerance but A0-C0 is not; the group
    // still joins all three through B0.
    let a = MemoryTable::of_reals(&[&[0.0], &[70.0]]);
    let b = MemoryTable::of_reals(&[&[0.15]]);
    let c = MemoryTable::of_reals(&[&[0.3], &[99.0]]);
    let engine = CartesianEngine::new(1, 0.2);
    let tables: [&dyn Table; 3] = [&a, &b, &c];
    let matcher = RowMatcher::new(&engine, &tables);

    let links = matcher
        .find_group_matches(&[Default, Default, Default])
        .unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0), (2, 0)]]);
}

#[test]
fn test_group_match_keeps_one_row_per_table() {
    // Two nearby rows of A both match B0; the group must be reduced to
    // one A ref (the first in sort order).
    let a = MemoryTable::of_reals(&[&[0.0], &[0.1]]);
    let b = MemoryTable::of_reals(&[&[0.05]]);
    let engine = CartesianEngine::new(1, 0.2);
    let tables: [&dyn Table; 2] = [&a, &b];
    let links = RowMatcher::new(&engine, &tables)
        .find_group_matches(&[Default, Default])
        .unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0)]]);
}

#[test]
fn test_group_match_join_types() {
    let a = MemoryTable::of_reals(&[&[0.0], &[10.0]]);
    let b = MemoryTable::of_reals(&[&[0.1], &[50.0]]);
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];
    let matcher = RowMatcher::new(&engine, &tables);

    // Default: only the matched group.
    let links = matcher.find_group_matches(&[Default, Default]).unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0)]]);

    // Always on table 1: its unmatched row appears as a singleton.
    let links = matcher.find_group_matches(&[Always, Default]).unwrap();
    assert_eq!(
        ref_sets(&links),
        vec![vec![(0, 0), (1, 0)], vec![(0, 1)]]
    );

    // NoMatch on table 1: only rows of table 2 with no table-1 partner.
    let links = matcher.find_group_matches(&[NoMatch, Always]).unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(1, 1)]]);

    // Match on both: same as the matched group here.
    let links = matcher.find_group_matches(&[Match, Match]).unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0)]]);
}

#[test]
fn test_group_match_requires_random_access() {
    let a = MemoryTable::of_reals(&[&[0.0]]);
    let b = MemoryTable::of_reals(&[&[0.1]]).sequential_only();
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];
    let result =
        RowMatcher::new(&engine, &tables).find_group_matches(&[Default, Default]);
    assert!(matches!(result, Err(Error::NonRandomTable(1))));
}

#[test]
fn test_group_match_join_arity_checked() {
    let a = MemoryTable::of_reals(&[&[0.0]]);
    let b = MemoryTable::of_reals(&[&[0.1]]);
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];
    let result = RowMatcher::new(&engine, &tables).find_group_matches(&[Default]);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_internal_match_finds_duplicate_groups() {
    let table =
        MemoryTable::of_reals(&[&[1.0], &[1.05], &[1.08], &[50.0]]);
    let engine = CartesianEngine::new(1, 0.2);
    let tables: [&dyn Table; 1] = [&table];
    let matcher = RowMatcher::new(&engine, &tables);

    // Without singles the isolated row at 50 is absent.
    let links = matcher.find_internal_matches(false).unwrap();
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (0, 1), (0, 2)]]);

    // With singles it appears as a singleton link.
    let links = matcher.find_internal_matches(true).unwrap();
    assert_eq!(
        ref_sets(&links),
        vec![vec![(0, 0), (0, 1), (0, 2)], vec![(0, 3)]]
    );
}

#[test]
fn test_internal_match_requires_single_table() {
    let a = MemoryTable::of_reals(&[&[0.0]]);
    let b = MemoryTable::of_reals(&[&[0.1]]);
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];
    let result = RowMatcher::new(&engine, &tables).find_internal_matches(false);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_multi_pair_collects_all_partners() {
    // A0 is close to both B rows and one C row; partner rows join the
    // hub but are never linked to each other.
    let a = MemoryTable::of_reals(&[&[0.0], &[5.0]]);
    let b = MemoryTable::of_reals(&[&[0.1], &[0.2]]);
    let c = MemoryTable::of_reals(&[&[0.05], &[40.0]]);
    let engine = CartesianEngine::new(1, 0.3);
    let tables: [&dyn Table; 3] = [&a, &b, &c];
    let matcher = RowMatcher::new(&engine, &tables);

    let links = matcher
        .find_multi_pair_matches(0, false, &[Default, Default, Default])
        .unwrap();
    assert_eq!(
        ref_sets(&links),
        vec![vec![(0, 0), (1, 0), (1, 1), (2, 0)]]
    );
    let link = links.iter().next().unwrap();
    let (hub, partners) = link.hub_parts().unwrap();
    assert_eq!((hub.table, hub.row), (0, 0));
    assert_eq!(partners.len(), 3);
}

#[test]
fn test_multi_pair_best_keeps_one_per_table() {
    let a = MemoryTable::of_reals(&[&[0.0], &[5.0]]);
    let b = MemoryTable::of_reals(&[&[0.1], &[0.2]]);
    let c = MemoryTable::of_reals(&[&[0.05], &[40.0]]);
    let engine = CartesianEngine::new(1, 0.3);
    let tables: [&dyn Table; 3] = [&a, &b, &c];
    let matcher = RowMatcher::new(&engine, &tables);

    let links = matcher
        .find_multi_pair_matches(0, true, &[Default, Default, Default])
        .unwrap();
    // Best per partner table: B0 (0.1) beats B1 (0.2); C0 stays.
    assert_eq!(ref_sets(&links), vec![vec![(0, 0), (1, 0), (2, 0)]]);
}

#[test]
fn test_multi_pair_always_adds_unmatched_reference_rows() {
    let a = MemoryTable::of_reals(&[&[0.0], &[5.0]]);
    let b = MemoryTable::of_reals(&[&[0.1]]);
    let engine = CartesianEngine::new(1, 0.3);
    let tables: [&dyn Table; 2] = [&a, &b];
    let matcher = RowMatcher::new(&engine, &tables);

    let links = matcher
        .find_multi_pair_matches(0, false, &[Always, Default])
        .unwrap();
    assert_eq!(
        ref_sets(&links),
        vec![vec![(0, 0), (1, 0)], vec![(0, 1)]]
    );
}

#[test]
fn test_multi_pair_reference_index_checked() {
    let a = MemoryTable::of_reals(&[&[0.0]]);
    let b = MemoryTable::of_reals(&[&[0.1]]);
    let engine = CartesianEngine::new(1, 0.5);
    let tables: [&dyn Table; 2] = [&a, &b];
    let result = RowMatcher::new(&engine, &tables)
        .find_multi_pair_matches(7, false, &[Default, Default]);
    assert!(matches!(result, Err(Error::Config(_))));
}
