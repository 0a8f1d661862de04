//! Adaptive small sets.
//!
//! Summaries hold tens of stations with a handful of variables each, so
//! the containers here are plain vectors that are only sorted when a
//! lookup needs it:
//!
//! - fewer than [`LINEAR_SCAN_MAX`] items: linear scan
//! - otherwise: rearrange, then binary search
//!
//! Rearranging sorts the whole vector when more than [`FULL_SORT_DIRTY`]
//! items were appended since the last sort, and insertion-sorts only the
//! appended tail into the sorted prefix otherwise.
//!
//! Invariant: `items[..len - dirty]` is sorted by key.

use std::fmt;
use std::marker::PhantomData;

/// Below this size, lookups scan linearly instead of sorting.
pub const LINEAR_SCAN_MAX: usize = 6;

/// Above this many unsorted items, rearranging does a full sort.
pub const FULL_SORT_DIRTY: usize = 16;

/// Extracts the ordering key of a set item.
pub trait KeyOf<T> {
    type Key: Ord;

    fn key(item: &T) -> &Self::Key;
}

/// Key extractor for sets of plain values.
pub struct Identity;

impl<T: Ord> KeyOf<T> for Identity {
    type Key = T;

    fn key(item: &T) -> &T {
        item
    }
}

// ── SmallSet ───────────────────────────────────────────────────────

/// Vector-backed set, lazily sorted by `K::key`.
///
/// `add` does not check for duplicates: callers that need uniqueness
/// look the key up first.
pub struct SmallSet<T, K> {
    items: Vec<T>,
    /// Number of trailing items not yet merged into the sorted prefix.
    dirty: usize,
    _key: PhantomData<fn() -> K>,
}

impl<T, K> SmallSet<T, K> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            dirty: 0,
            _key: PhantomData,
        }
    }

    /// Append an item. O(1) amortized; returns its current index.
    pub fn add(&mut self, item: T) -> usize {
        self.items.push(item);
        self.dirty += 1;
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    /// Mutable access to an item. The caller must not change its key.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.items.get_mut(idx)
    }

    /// Iterate in storage order (sorted only after [`rearrange`](Self::rearrange)).
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutable iteration in storage order. The caller must not change keys.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// True if storage order is fully sorted.
    pub fn is_sorted(&self) -> bool {
        self.dirty == 0
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.dirty = 0;
    }
}

impl<T, K: KeyOf<T>> SmallSet<T, K> {
    /// Bring storage order to fully sorted.
    pub fn rearrange(&mut self) {
        if self.dirty == 0 {
            return;
        }
        if self.dirty > FULL_SORT_DIRTY {
            self.items.sort_by(|a, b| K::key(a).cmp(K::key(b)));
        } else {
            let len = self.items.len();
            for i in (len - self.dirty)..len {
                let mut j = i;
                while j > 0 && K::key(&self.items[j - 1]) > K::key(&self.items[j]) {
                    self.items.swap(j - 1, j);
                    j -= 1;
                }
            }
        }
        self.dirty = 0;
    }

    /// Find the index of the item with the given key.
    ///
    /// May rearrange storage; membership never changes.
    pub fn find(&mut self, key: &K::Key) -> Option<usize> {
        if self.items.len() < LINEAR_SCAN_MAX {
            return self.items.iter().position(|item| K::key(item) == key);
        }
        self.rearrange();
        self.items
            .binary_search_by(|item| K::key(item).cmp(key))
            .ok()
    }

    /// Find without rearranging: binary search on the sorted prefix, then
    /// a scan of the unsorted tail.
    pub fn position(&self, key: &K::Key) -> Option<usize> {
        let sorted_len = self.items.len() - self.dirty;
        if let Ok(idx) = self.items[..sorted_len].binary_search_by(|item| K::key(item).cmp(key)) {
            return Some(idx);
        }
        self.items[sorted_len..]
            .iter()
            .position(|item| K::key(item) == key)
            .map(|pos| pos + sorted_len)
    }

    /// Find the item with the given key, appending `make()` if missing.
    pub fn find_or_add(&mut self, key: &K::Key, make: impl FnOnce() -> T) -> &mut T {
        let idx = match self.find(key) {
            Some(idx) => idx,
            None => self.add(make()),
        };
        &mut self.items[idx]
    }

    pub fn contains(&self, key: &K::Key) -> bool {
        self.position(key).is_some()
    }

    /// Rearrange, then return the items in key order.
    pub fn sorted(&mut self) -> &[T] {
        self.rearrange();
        &self.items
    }

    /// References to all items in key order, without touching storage.
    pub fn sorted_refs(&self) -> Vec<&T> {
        let mut refs: Vec<&T> = self.items.iter().collect();
        if self.dirty > 0 {
            refs.sort_by(|a, b| K::key(a).cmp(K::key(b)));
        }
        refs
    }
}

impl<T, K> Default for SmallSet<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, K> Clone for SmallSet<T, K> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            dirty: self.dirty,
            _key: PhantomData,
        }
    }
}

impl<T: fmt::Debug, K> fmt::Debug for SmallSet<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

/// Equal if both hold equal items once sorted; insertion order is irrelevant.
impl<T: PartialEq, K: KeyOf<T>> PartialEq for SmallSet<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.sorted_refs() == other.sorted_refs()
    }
}

impl<T: Eq, K: KeyOf<T>> Eq for SmallSet<T, K> {}

impl<'a, T, K> IntoIterator for &'a SmallSet<T, K> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ── Value sets ─────────────────────────────────────────────────────

/// Small set of distinct values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmallUniqueValueSet<T: Ord> {
    set: SmallSet<T, Identity>,
}

impl<T: Ord> SmallUniqueValueSet<T> {
    pub fn new() -> Self {
        Self { set: SmallSet::new() }
    }

    /// Add a value; no-op if already present. Returns true if added.
    pub fn add(&mut self, value: T) -> bool {
        if self.set.find(&value).is_some() {
            return false;
        }
        self.set.add(value);
        true
    }

    pub fn contains(&self, value: &T) -> bool {
        self.set.contains(value)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn rearrange(&mut self) {
        self.set.rearrange();
    }

    /// Iterate in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.set.iter()
    }
}

impl<T: Ord> Default for SmallUniqueValueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Small set of distinct values that always iterates in sorted order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedSmallUniqueValueSet<T: Ord> {
    values: SmallUniqueValueSet<T>,
}

impl<T: Ord> SortedSmallUniqueValueSet<T> {
    pub fn new() -> Self {
        Self {
            values: SmallUniqueValueSet::new(),
        }
    }

    pub fn add(&mut self, value: T) -> bool {
        self.values.add(value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Sort storage so that later iteration needs no extra work.
    pub fn rearrange(&mut self) {
        self.values.rearrange();
    }

    /// Iterate in sorted order.
    pub fn iter(&self) -> std::vec::IntoIter<&T> {
        self.values.set.sorted_refs().into_iter()
    }
}

impl<T: Ord> Default for SortedSmallUniqueValueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct ByFirst;

    impl KeyOf<(u32, &'static str)> for ByFirst {
        type Key = u32;

        fn key<'a>(item: &'a (u32, &'static str)) -> &'a u32 {
            &item.0
        }
    }

    #[test]
    fn test_linear_scan_below_threshold() {
        let mut set: SmallSet<u32, Identity> = SmallSet::new();
        for v in [5, 3, 9] {
            set.add(v);
        }
        assert_eq!(set.find(&3), Some(1));
        // Small sets are never rearranged by lookups
        assert!(!set.is_sorted());
        assert_eq!(set.find(&4), None);
    }

    #[test]
    fn test_find_rearranges_above_threshold() {
        let mut set: SmallSet<u32, Identity> = SmallSet::new();
        for v in [50, 30, 90, 10, 70, 20, 60] {
            set.add(v);
        }
        let idx = set.find(&70).unwrap();
        assert!(set.is_sorted());
        assert_eq!(set.get(idx), Some(&70));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30, 50, 60, 70, 90]);
    }

    #[test]
    fn test_partial_rearrange_merges_tail() {
        let mut set: SmallSet<u32, Identity> = SmallSet::new();
        for v in 0..10 {
            set.add(v * 10);
        }
        set.rearrange();
        set.add(55);
        set.add(5);
        assert_eq!(set.position(&55), Some(10));
        assert_eq!(set.find(&5), Some(1));
        assert_eq!(set.get(7), Some(&55));
    }

    #[test]
    fn test_keyed_items() {
        let mut set: SmallSet<(u32, &'static str), ByFirst> = SmallSet::new();
        for (i, name) in ["g", "f", "e", "d", "c", "b", "a"].iter().enumerate() {
            set.add((10 - i as u32, *name));
        }
        let idx = set.find(&7).unwrap();
        assert_eq!(set.get(idx).unwrap().1, "d");
        assert!(set.find(&1).is_none());
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let mut a: SmallSet<u32, Identity> = SmallSet::new();
        let mut b: SmallSet<u32, Identity> = SmallSet::new();
        for v in 0..20 {
            a.add(v);
            b.add(19 - v);
        }
        assert_eq!(a, b);
        b.add(100);
        assert_ne!(a, b);
    }

    #[test]
    fn test_unique_value_set() {
        let mut set = SmallUniqueValueSet::new();
        assert!(set.add("synop".to_string()));
        assert!(!set.add("synop".to_string()));
        assert!(set.add("temp".to_string()));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&"temp".to_string()));
    }

    #[test]
    fn test_sorted_set_iterates_in_order() {
        let mut set = SortedSmallUniqueValueSet::new();
        for v in [9, 2, 7, 2, 4] {
            set.add(v);
        }
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![2, 4, 7, 9]);
        set.rearrange();
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![2, 4, 7, 9]);
    }

    fn shuffled_keys() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::btree_set(0u32..500, 0..60)
            .prop_map(|keys| keys.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn prop_find_locates_every_inserted_key(keys in shuffled_keys(), queries in prop::collection::vec(0u32..500, 20)) {
            let mut set: SmallSet<u32, Identity> = SmallSet::new();
            for (n, key) in keys.iter().enumerate() {
                set.add(*key);
                // Interleave lookups so both the partial and the full
                // rearrange paths are exercised
                if n % 7 == 3 {
                    prop_assert!(set.find(key).is_some());
                }
            }
            for key in &keys {
                let idx = set.find(key);
                prop_assert!(idx.is_some());
                prop_assert_eq!(set.get(idx.unwrap()), Some(key));
                prop_assert!(set.position(key).is_some());
            }
            for key in queries {
                let expected = keys.contains(&key);
                prop_assert_eq!(set.find(&key).is_some(), expected);
                prop_assert_eq!(set.position(&key).is_some(), expected);
            }
            prop_assert_eq!(set.len(), keys.len());
        }
    }
}
