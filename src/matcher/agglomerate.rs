//! Agglomeration of pairwise links into transitive-closure groups.
//!
//! The pairwise-match graph has rows for nodes and links for edges; each
//! output group is one connected component. Components are found with an
//! arena union-find (one node per input link, parent and size vectors,
//! union by size with path compression). In real catalogs the vast
//! majority of links never merge with another, so isolated links take a
//! fast path straight to the output.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::link::{LinkSet, RowLink, RowRef};

/// Index-arena union-find with union by size and path compression.
struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        while self.parent[x as usize] != root {
            let next = self.parent[x as usize];
            self.parent[x as usize] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        // Re-point the smaller component at the larger one.
        let (big, small) = if self.size[ra as usize] >= self.size[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
    }

    fn component_size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.size[root as usize]
    }
}

/// Merge a set of links into mutually disjoint transitive-closure groups.
///
/// Every input ref appears in exactly one output link; each output link
/// is the union of the refs of one connected component of the input.
/// The input set is drained.
pub(crate) fn agglomerate_links(mut links: LinkSet) -> LinkSet {
    let links: Vec<RowLink> = links.drain().collect();
    let mut uf = UnionFind::new(links.len());

    // Two links sharing any ref belong to one component.
    let mut owner: HashMap<RowRef, u32> = HashMap::new();
    for (i, link) in links.iter().enumerate() {
        for &r in link.refs() {
            match owner.entry(r) {
                Entry::Vacant(e) => {
                    e.insert(i as u32);
                }
                Entry::Occupied(e) => uf.union(i as u32, *e.get()),
            }
        }
    }
    drop(owner);

    let mut out = LinkSet::new();
    let mut components: HashMap<u32, Vec<RowRef>> = HashMap::new();
    for (i, link) in links.into_iter().enumerate() {
        if uf.component_size(i as u32) == 1 {
            // Isolated link: no shared refs anywhere, copy it through.
            out.insert(link);
        } else {
            let root = uf.find(i as u32);
            components
                .entry(root)
                .or_default()
                .extend_from_slice(link.refs());
        }
    }
    for (_, refs) in components {
        out.insert(RowLink::group(refs));
    }
    out
}

/// Replace links that associate several rows of one table.
///
/// A group containing two or more refs from the same table is ambiguous;
/// it is reduced to at most one ref per table (the first in sort order),
/// and the reduced link is kept only if at least two tables remain
/// represented. Returns `(n_replaced, n_removed)`.
pub(crate) fn eliminate_internal_links(links: &mut LinkSet) -> (u64, u64) {
    let mut n_replaced = 0;
    let mut n_removed = 0;
    let mut cleaned = LinkSet::new();
    let mut kept: Vec<RowRef> = Vec::new();
    for link in links.drain() {
        if link.len() > 1 && link.table_count() < link.len() {
            // Refs are sorted, so the first ref seen for a table is the
            // one sort order elects to keep.
            kept.clear();
            let mut last_table = None;
            for &r in link.refs() {
                if last_table != Some(r.table) {
                    kept.push(r);
                    last_table = Some(r.table);
                }
            }
            if kept.len() > 1 {
                cleaned.insert(RowLink::group(kept.iter().copied()));
                n_replaced += 1;
            } else {
                n_removed += 1;
            }
        } else {
            cleaned.insert(link);
        }
    }
    *links = cleaned;
    (n_replaced, n_removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(table: u32, row: u64) -> RowRef {
        RowRef::new(table, row)
    }

    fn pair_set(pairs: &[(RowRef, RowRef)]) -> LinkSet {
        let mut set = LinkSet::new();
        for &(a, b) in pairs {
            set.insert(RowLink::pair(a, b, 0.0));
        }
        set
    }

    #[test]
    fn test_isolated_pairs_pass_through() {
        let input = pair_set(&[(r(0, 1), r(1, 1)), (r(0, 2), r(1, 2))]);
        let out = agglomerate_links(input);
        assert_eq!(out.len(), 2);
        assert!(out.contains(&RowLink::group([r(0, 1), r(1, 1)])));
        assert!(out.contains(&RowLink::group([r(0, 2), r(1, 2)])));
    }

    #[test]
    fn test_chain_collapses_to_one_group() {
        // a-b, b-c, c-d: one component of four refs.
        let input = pair_set(&[
            (r(0, 1), r(1, 1)),
            (r(1, 1), r(2, 1)),
            (r(2, 1), r(0, 9)),
        ]);
        let out = agglomerate_links(input);
        assert_eq!(out.len(), 1);
        assert!(out.contains(&RowLink::group([
            r(0, 1),
            r(1, 1),
            r(2, 1),
            r(0, 9)
        ])));
    }

    #[test]
    fn test_every_ref_appears_exactly_once() {
        // A mix of isolated pairs and a star around one hub row.
        let hub = r(1, 0);
        let input = pair_set(&[
            (r(0, 0), hub),
            (r(0, 1), hub),
            (r(2, 5), hub),
            (r(0, 7), r(1, 7)),
        ]);
        let out = agglomerate_links(input);
        let mut seen: Vec<RowRef> = Vec::new();
        for link in out.iter() {
            seen.extend_from_slice(link.refs());
        }
        seen.sort_unstable();
        let dedup_len = {
            let mut v = seen.clone();
            v.dedup();
            v.len()
        };
        assert_eq!(seen.len(), dedup_len, "a ref appeared in two groups");
        assert_eq!(seen.len(), 6);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_eliminate_internal_links() {
        let mut links = LinkSet::new();
        // Two rows of table 0 plus one of table 1: reduced, keeping row 2.
        links.insert(RowLink::group([r(0, 5), r(0, 2), r(1, 1)]));
        // Two rows of the same table only: dropped.
        links.insert(RowLink::group([r(2, 1), r(2, 2)]));
        // Clean link: untouched.
        links.insert(RowLink::group([r(0, 8), r(1, 8)]));

        let (n_replaced, n_removed) = eliminate_internal_links(&mut links);
        assert_eq!((n_replaced, n_removed), (1, 1));
        assert_eq!(links.len(), 2);
        assert!(links.contains(&RowLink::group([r(0, 2), r(1, 1)])));
        assert!(links.contains(&RowLink::group([r(0, 8), r(1, 8)])));
    }
}
