//! Shared helpers for the integration tests.
#![allow(dead_code)]

use milan_match::harness::MemoryTable;
use milan_match::LinkSet;
use rand::rngs::StdRng;
use rand::Rng;

/// Canonical, comparable form of a link set: sorted ref lists plus the
/// pair score scaled to an integer (so float noise cannot differ).
pub fn normalize(links: &LinkSet) -> Vec<(Vec<(u32, u64)>, Option<i64>)> {
    let mut out: Vec<(Vec<(u32, u64)>, Option<i64>)> = links
        .iter()
        .map(|link| {
            let refs: Vec<(u32, u64)> =
                link.refs().iter().map(|r| (r.table, r.row)).collect();
            let score = link.score().map(|s| (s * 1e9).round() as i64);
            (refs, score)
        })
        .collect();
    out.sort();
    out
}

/// Ref lists only, ignoring scores and link shapes.
pub fn ref_sets(links: &LinkSet) -> Vec<Vec<(u32, u64)>> {
    let mut out: Vec<Vec<(u32, u64)>> = links
        .iter()
        .map(|link| link.refs().iter().map(|r| (r.table, r.row)).collect())
        .collect();
    out.sort();
    out
}

/// Table of `n` uniformly random points in `[0, span)^ndim`.
pub fn random_table(rng: &mut StdRng, n: usize, ndim: usize, span: f64) -> MemoryTable {
    let mut table = MemoryTable::new(ndim);
    for _ in 0..n {
        let row = (0..ndim)
            .map(|_| milan_match::Datum::Real(rng.gen::<f64>() * span))
            .collect();
        table.add_row(row).unwrap();
    }
    table
}
