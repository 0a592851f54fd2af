use std::borrow::Borrow;
use std::collections::BTreeMap;
use roaring::RoaringBitmap;
use crate::bitmap::algebra::{self, Set};
use crate::core::types::RecordId;

/// Value -> ids map backing the discrete field types.
#[derive(Debug, Clone)]
pub struct ValueMap<K: Ord> {
    sets: BTreeMap<K, RoaringBitmap>,
}

impl<K: Ord + Clone> ValueMap<K> {
    pub fn new() -> Self {
        ValueMap {
            sets: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, key: K, id: RecordId) {
        self.sets
            .entry(key)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);
    }

    pub fn get<Q>(&self, key: &Q) -> Set<'_>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.sets
            .get(key)
            .map(algebra::persisted)
            .unwrap_or_else(algebra::empty)
    }

    /// Drop `id` from the set of `key` only.
    pub fn remove_from<Q>(&mut self, key: &Q, id: RecordId)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let now_empty = match self.sets.get_mut(key) {
            Some(set) => {
                set.remove(id);
                set.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.sets.remove(key);
        }
    }

    /// Drop `id` from every value.
    pub fn remove_id(&mut self, id: RecordId) -> bool {
        let mut removed = false;
        for set in self.sets.values_mut() {
            removed |= set.remove(id);
        }
        if removed {
            self.sets.retain(|_, set| !set.is_empty());
        }
        removed
    }

    pub fn swap(&mut self, a: RecordId, b: RecordId) {
        for set in self.sets.values_mut() {
            algebra::swap_membership(set, a, b);
        }
    }

    pub fn contains_id(&self, id: RecordId) -> bool {
        self.sets.values().any(|set| set.contains(id))
    }

    /// Every id holding at least one value.
    pub fn union_all(&self) -> Set<'_> {
        algebra::or_many(self.sets.values().map(algebra::persisted).collect())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.sets.keys()
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// The `limit` most frequent values, ties by key order.
    pub fn top(&self, limit: usize) -> Vec<(K, u64)> {
        let mut counts: Vec<(K, u64)> = self
            .sets
            .iter()
            .map(|(key, set)| (key.clone(), set.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(limit);
        counts
    }
}

impl<K: Ord + Clone> Default for ValueMap<K> {
    fn default() -> Self {
        Self::new()
    }
}
