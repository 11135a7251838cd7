//! Row-index multi-map with a narrow-integer storage option.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

/// Per-bin storage for row indices.
///
/// Narrow (`u32`) tiers halve the per-index footprint for tables whose
/// row count fits in 32 bits, which is nearly every real catalog.
#[derive(Clone, Debug)]
enum Slot {
    Narrow1(u32),
    Narrow2([u32; 2]),
    NarrowN(Vec<u32>),
    Wide1(u64),
    Wide2([u64; 2]),
    WideN(Vec<u64>),
}

impl Slot {
    fn new(index: u64, narrow: bool) -> Self {
        if narrow {
            Slot::Narrow1(index as u32)
        } else {
            Slot::Wide1(index)
        }
    }

    fn push(&mut self, index: u64) {
        let old = mem::replace(self, Slot::Wide1(0));
        *self = match old {
            Slot::Narrow1(a) => Slot::Narrow2([a, index as u32]),
            Slot::Narrow2([a, b]) => Slot::NarrowN(vec![a, b, index as u32]),
            Slot::NarrowN(mut values) => {
                values.push(index as u32);
                Slot::NarrowN(values)
            }
            Slot::Wide1(a) => Slot::Wide2([a, index]),
            Slot::Wide2([a, b]) => Slot::WideN(vec![a, b, index]),
            Slot::WideN(mut values) => {
                values.push(index);
                Slot::WideN(values)
            }
        };
    }

    fn len(&self) -> usize {
        match self {
            Slot::Narrow1(_) | Slot::Wide1(_) => 1,
            Slot::Narrow2(_) | Slot::Wide2(_) => 2,
            Slot::NarrowN(values) => values.len(),
            Slot::WideN(values) => values.len(),
        }
    }

    fn iter(&self) -> Longs<'_> {
        match self {
            Slot::Narrow1(v) => Longs::narrow(std::slice::from_ref(v)),
            Slot::Narrow2(pair) => Longs::narrow(pair),
            Slot::NarrowN(values) => Longs::narrow(values),
            Slot::Wide1(v) => Longs::wide(std::slice::from_ref(v)),
            Slot::Wide2(pair) => Longs::wide(pair),
            Slot::WideN(values) => Longs::wide(values),
        }
    }
}

/// Iterator over the row indices stored in one bin.
pub struct Longs<'a> {
    narrow: &'a [u32],
    wide: &'a [u64],
    pos: usize,
}

impl<'a> Longs<'a> {
    fn narrow(values: &'a [u32]) -> Self {
        Self {
            narrow: values,
            wide: &[],
            pos: 0,
        }
    }

    fn wide(values: &'a [u64]) -> Self {
        Self {
            narrow: &[],
            wide: values,
            pos: 0,
        }
    }
}

impl Iterator for Longs<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let i = self.pos;
        self.pos += 1;
        if !self.narrow.is_empty() {
            self.narrow.get(i).map(|&v| u64::from(v))
        } else {
            self.wide.get(i).copied()
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.narrow.len() + self.wide.len()).saturating_sub(self.pos);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Longs<'_> {}

/// Multi-map from bin key to row indices.
///
/// Construct with [`LongBinner::for_rows`], which picks narrow index
/// storage when every row index of the table fits in 32 bits.
#[derive(Debug)]
pub struct LongBinner<K> {
    map: HashMap<K, Slot>,
    narrow: bool,
    items: u64,
}

impl<K: Eq + Hash> LongBinner<K> {
    /// New binner for a table with the given row count.
    pub fn for_rows(row_count: u64) -> Self {
        Self {
            map: HashMap::new(),
            narrow: row_count <= u64::from(u32::MAX),
            items: 0,
        }
    }

    /// Add one row index under a key.
    pub fn add_item(&mut self, key: K, index: u64) {
        debug_assert!(!self.narrow || index <= u64::from(u32::MAX));
        match self.map.entry(key) {
            Entry::Vacant(e) => {
                e.insert(Slot::new(index, self.narrow));
            }
            Entry::Occupied(mut e) => e.get_mut().push(index),
        }
        self.items += 1;
    }

    /// Iterate the row indices stored under a key.
    pub fn get(&self, key: &K) -> Option<Longs<'_>> {
        self.map.get(key).map(Slot::iter)
    }

    /// Whether any index is stored under a key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Number of distinct keys.
    #[inline]
    pub fn bin_count(&self) -> u64 {
        self.map.len() as u64
    }

    /// Total number of stored indices.
    #[inline]
    pub fn item_count(&self) -> u64 {
        self.items
    }

    /// Consume and remove every bin, reclaiming memory as the iterator
    /// advances.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, Vec<u64>)> + '_ {
        self.items = 0;
        self.map
            .drain()
            .map(|(k, slot)| (k, slot.iter().collect()))
    }

    /// Merge two independently built binners (larger side is the base).
    ///
    /// The result is identical, up to per-bin order, to building a single
    /// binner from all insertions.
    pub fn combine(self, other: Self) -> Self {
        let (mut base, addendum) = if self.bin_count() >= other.bin_count() {
            (self, other)
        } else {
            (other, self)
        };
        for (key, slot) in addendum.map {
            match base.map.entry(key) {
                Entry::Vacant(e) => {
                    // Re-tier rather than move so a narrow base stays
                    // narrow even when fed from a wide addendum.
                    let mut values = slot.iter();
                    if let Some(first) = values.next() {
                        let mut rebuilt = Slot::new(first, base.narrow);
                        for v in values {
                            rebuilt.push(v);
                        }
                        base.items += rebuilt.len() as u64;
                        e.insert(rebuilt);
                    }
                }
                Entry::Occupied(mut e) => {
                    for v in slot.iter() {
                        e.get_mut().push(v);
                        base.items += 1;
                    }
                }
            }
        }
        base
    }
}
