//! Ordered map keyed by floating-point priority.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Key of an entry in an [`OrderedPriorityMap`].
///
/// Priorities are ordered with `f64::total_cmp`; entries with an identical
/// priority are ordered by insertion, oldest first, so an exact collision never
/// replaces or hides an existing entry.
#[derive(Debug, Clone, Copy)]
pub struct PriorityKey {
    priority: f64,
    seq: u64,
}

impl PriorityKey {
    pub fn priority(&self) -> f64 {
        self.priority
    }
}

impl PartialEq for PriorityKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityKey {}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Balanced ordered map from priority to value with O(log n) insert, remove and minimum.
#[derive(Debug, Clone)]
pub struct OrderedPriorityMap<V> {
    entries: BTreeMap<PriorityKey, V>,
    next_seq: u64,
}

impl<V> OrderedPriorityMap<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Insert `value` under `priority`, returning the key that identifies it.
    pub fn insert(&mut self, priority: f64, value: V) -> PriorityKey {
        let key = PriorityKey {
            priority,
            seq: self.next_seq,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.insert(key, value);
        key
    }

    pub fn remove(&mut self, key: &PriorityKey) -> Option<V> {
        self.entries.remove(key)
    }

    /// Entry with the lowest priority.
    pub fn min(&self) -> Option<(PriorityKey, &V)> {
        self.entries.iter().next().map(|(k, v)| (*k, v))
    }

    pub fn pop_min(&mut self) -> Option<(PriorityKey, V)> {
        self.entries.pop_first()
    }

    /// Entries in ascending priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&PriorityKey, &V)> {
        self.entries.iter()
    }

    /// Replace every priority with `f(priority)`, keeping the values.
    ///
    /// `f` should be monotonic; ties keep their previous relative order.
    pub fn rekey(&mut self, mut f: impl FnMut(f64) -> f64) {
        let old = std::mem::take(&mut self.entries);
        for (key, value) in old {
            self.entries.insert(
                PriorityKey {
                    priority: f(key.priority),
                    seq: key.seq,
                },
                value,
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V> Default for OrderedPriorityMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
