//! General-purpose tiered multi-map.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

/// Per-bin storage tier; promoted transparently on overflow.
#[derive(Clone, Debug)]
enum Slot<V> {
    One(V),
    Two([V; 2]),
    Many(Vec<V>),
}

impl<V> Slot<V> {
    fn push(&mut self, value: V) {
        // Two-step replace so the old payload can move into the new tier.
        let old = mem::replace(self, Slot::Many(Vec::new()));
        *self = match old {
            Slot::One(a) => Slot::Two([a, value]),
            Slot::Two([a, b]) => Slot::Many(vec![a, b, value]),
            Slot::Many(mut values) => {
                values.push(value);
                Slot::Many(values)
            }
        };
    }

    fn as_slice(&self) -> &[V] {
        match self {
            Slot::One(v) => std::slice::from_ref(v),
            Slot::Two(pair) => pair,
            Slot::Many(values) => values,
        }
    }

    fn len(&self) -> usize {
        match self {
            Slot::One(_) => 1,
            Slot::Two(_) => 2,
            Slot::Many(values) => values.len(),
        }
    }

    fn into_vec(self) -> Vec<V> {
        match self {
            Slot::One(v) => vec![v],
            Slot::Two([a, b]) => vec![a, b],
            Slot::Many(values) => values,
        }
    }
}

/// Multi-map from bin key to the values accumulated under it.
///
/// `values(k)` returns exactly the multiset of values ever added under
/// `k`, in insertion order within each builder; after a
/// [`ObjectBinner::combine`] the per-key multiset equals what
/// single-threaded insertion of all entries would have produced.
#[derive(Debug)]
pub struct ObjectBinner<K, V> {
    map: HashMap<K, Slot<V>>,
    items: u64,
}

impl<K, V> Default for ObjectBinner<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            items: 0,
        }
    }
}

impl<K: Eq + Hash, V> ObjectBinner<K, V> {
    /// New empty binner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value under a key.
    pub fn add_item(&mut self, key: K, value: V) {
        match self.map.entry(key) {
            Entry::Vacant(e) => {
                e.insert(Slot::One(value));
            }
            Entry::Occupied(mut e) => e.get_mut().push(value),
        }
        self.items += 1;
    }

    /// Values accumulated under a key, if any.
    pub fn values(&self, key: &K) -> Option<&[V]> {
        self.map.get(key).map(Slot::as_slice)
    }

    /// Whether any value has been added under a key.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Remove a key, returning its values.
    pub fn remove(&mut self, key: &K) -> Option<Vec<V>> {
        let values = self.map.remove(key)?;
        self.items -= values.len() as u64;
        Some(values.into_vec())
    }

    /// Number of distinct keys.
    #[inline]
    pub fn bin_count(&self) -> u64 {
        self.map.len() as u64
    }

    /// Total number of values across all keys.
    #[inline]
    pub fn item_count(&self) -> u64 {
        self.items
    }

    /// Consume and remove every bin, reclaiming memory as the iterator
    /// advances.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, Vec<V>)> + '_ {
        self.items = 0;
        self.map.drain().map(|(k, slot)| (k, slot.into_vec()))
    }

    /// Merge two independently built binners.
    ///
    /// The binner with more bins becomes the base and the other's entries
    /// fold in one at a time, bounding the work by the smaller side.
    /// Associative and commutative up to per-key value order, which
    /// callers must not rely on.
    pub fn combine(self, other: Self) -> Self {
        let (mut base, addendum) = if self.bin_count() >= other.bin_count() {
            (self, other)
        } else {
            (other, self)
        };
        for (key, slot) in addendum.map {
            match base.map.entry(key) {
                Entry::Vacant(e) => {
                    base.items += slot.len() as u64;
                    e.insert(slot);
                }
                Entry::Occupied(mut e) => {
                    for value in slot.into_vec() {
                        e.get_mut().push(value);
                        base.items += 1;
                    }
                }
            }
        }
        base
    }
}
