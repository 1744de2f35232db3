//! Ordered containers backing cache and listener storage.
//!
//! Two small structures live here: [`SlotList`], an ordered doubly linked
//! list with O(1) append and delete-by-identity, and [`NestedMap`], a
//! two-level map whose inner slots are compared with a caller-supplied
//! equality function. The second exists because listener identity is
//! pointer equality over callbacks, which no structural hash can express.

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable identity of a [`SlotList`] entry.
    pub struct SlotKey;
}

struct SlotNode<T> {
    value: T,
    prev: Option<SlotKey>,
    next: Option<SlotKey>,
}

/// An ordered doubly linked list over a slotmap arena.
///
/// Appending returns a [`SlotKey`] that stays valid until the entry is
/// removed, giving O(1) delete-by-identity. Iteration follows append order.
pub struct SlotList<T> {
    nodes: SlotMap<SlotKey, SlotNode<T>>,
    head: Option<SlotKey>,
    tail: Option<SlotKey>,
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    /// Number of entries in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the list holds no entries.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a value at the tail, returning its stable key.
    pub fn append(&mut self, value: T) -> SlotKey {
        let key = self.nodes.insert(SlotNode {
            value,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    /// Removes the entry with the given key, returning its value.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let node = self.nodes.remove(key)?;
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node.value)
    }

    /// Returns a reference to the value stored under `key`.
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.nodes.get(key).map(|node| &node.value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.nodes.get_mut(key).map(|node| &mut node.value)
    }

    /// Iterates values in append order.
    pub fn iter(&self) -> SlotListIter<'_, T> {
        SlotListIter {
            list: self,
            cursor: self.head,
        }
    }

    /// Iterates `(key, value)` pairs in append order.
    pub fn iter_keys(&self) -> SlotListKeyIter<'_, T> {
        SlotListKeyIter {
            list: self,
            cursor: self.head,
        }
    }
}

impl<T: PartialEq> SlotList<T> {
    /// Removes the first entry equal to `value`. Returns false on no match.
    pub fn delete(&mut self, value: &T) -> bool {
        let found = self
            .iter_keys()
            .find(|(_, candidate)| *candidate == value)
            .map(|(key, _)| key);
        match found {
            Some(key) => {
                self.remove(key);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone> SlotList<T> {
    /// Collects the list into a `Vec` in append order.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Iterator over [`SlotList`] values in append order.
pub struct SlotListIter<'a, T> {
    list: &'a SlotList<T>,
    cursor: Option<SlotKey>,
}

impl<'a, T> Iterator for SlotListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let key = self.cursor?;
        let node = &self.list.nodes[key];
        self.cursor = node.next;
        Some(&node.value)
    }
}

/// Iterator over [`SlotList`] `(key, value)` pairs in append order.
pub struct SlotListKeyIter<'a, T> {
    list: &'a SlotList<T>,
    cursor: Option<SlotKey>,
}

impl<'a, T> Iterator for SlotListKeyIter<'a, T> {
    type Item = (SlotKey, &'a T);

    fn next(&mut self) -> Option<(SlotKey, &'a T)> {
        let key = self.cursor?;
        let node = &self.list.nodes[key];
        self.cursor = node.next;
        Some((key, &node.value))
    }
}

/// A two-level map: outer hash key to an ordered list of `(inner key,
/// value)` slots.
///
/// Inner keys are compared with the equality function supplied at
/// construction. Setting an existing `(outer, inner)` pair replaces the
/// value in place; deleting the last slot of an outer key removes the
/// bucket entirely. Iteration yields `(outer, inner, value)` triples in
/// insertion order.
pub struct NestedMap<K1, K2, V> {
    buckets: FxHashMap<K1, SlotList<(K2, V)>>,
    order: Vec<K1>,
    eq: fn(&K2, &K2) -> bool,
}

impl<K1, K2, V> NestedMap<K1, K2, V>
where
    K1: std::hash::Hash + Eq + Clone,
{
    /// Creates an empty map using `eq` to compare inner keys.
    pub fn new(eq: fn(&K2, &K2) -> bool) -> Self {
        Self {
            buckets: FxHashMap::default(),
            order: Vec::new(),
            eq,
        }
    }

    /// Total number of `(outer, inner)` slots.
    pub fn len(&self) -> usize {
        self.buckets.values().map(SlotList::len).sum()
    }

    /// Returns true if the map holds no slots.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Inserts or replaces the value under `(outer, inner)`.
    pub fn set(&mut self, outer: K1, inner: K2, value: V) {
        let eq = self.eq;
        let bucket = match self.buckets.entry(outer.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                self.order.push(outer);
                entry.insert(SlotList::new())
            }
        };
        let existing = bucket
            .iter_keys()
            .find(|(_, (candidate, _))| eq(candidate, &inner))
            .map(|(key, _)| key);
        match existing {
            Some(key) => {
                if let Some(slot) = bucket.get_mut(key) {
                    slot.1 = value;
                }
            }
            None => {
                bucket.append((inner, value));
            }
        }
    }

    /// Returns the value under `(outer, inner)`, if present.
    pub fn get(&self, outer: &K1, inner: &K2) -> Option<&V> {
        let bucket = self.buckets.get(outer)?;
        bucket
            .iter()
            .find(|(candidate, _)| (self.eq)(candidate, inner))
            .map(|(_, value)| value)
    }

    /// Removes the slot under `(outer, inner)`; drops the bucket when it was
    /// the last slot. Returns false when no such slot exists.
    pub fn delete(&mut self, outer: &K1, inner: &K2) -> bool {
        let eq = self.eq;
        let Some(bucket) = self.buckets.get_mut(outer) else {
            return false;
        };
        let found = bucket
            .iter_keys()
            .find(|(_, (candidate, _))| eq(candidate, inner))
            .map(|(key, _)| key);
        let Some(key) = found else {
            return false;
        };
        bucket.remove(key);
        if bucket.is_empty() {
            self.buckets.remove(outer);
            self.order.retain(|registered| registered != outer);
        }
        true
    }

    /// Removes an entire outer bucket. Returns false when absent.
    pub fn delete_outer(&mut self, outer: &K1) -> bool {
        if self.buckets.remove(outer).is_none() {
            return false;
        }
        self.order.retain(|registered| registered != outer);
        true
    }

    /// Returns true if `outer` has at least one slot.
    pub fn contains_outer(&self, outer: &K1) -> bool {
        self.buckets.contains_key(outer)
    }

    /// Iterates `(outer, inner, value)` triples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K1, &K2, &V)> {
        self.order.iter().flat_map(move |outer| {
            self.buckets
                .get(outer)
                .into_iter()
                .flat_map(move |bucket| {
                    bucket.iter().map(move |(inner, value)| (outer, inner, value))
                })
        })
    }

    /// Iterates the slots of one outer bucket in insertion order.
    pub fn iter_outer(&self, outer: &K1) -> impl Iterator<Item = (&K2, &V)> {
        self.buckets
            .get(outer)
            .into_iter()
            .flat_map(|bucket| bucket.iter().map(|(inner, value)| (inner, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_list_append_and_delete_preserve_order() {
        let mut list = SlotList::new();
        list.append(1);
        let two = list.append(2);
        list.append(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.to_vec(), vec![1, 2, 3]);

        list.remove(two);
        assert_eq!(list.to_vec(), vec![1, 3]);

        assert!(list.delete(&3));
        assert!(!list.delete(&42));
        assert_eq!(list.to_vec(), vec![1]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn slot_list_delete_removes_first_match_only() {
        let mut list = SlotList::new();
        list.append("a");
        list.append("b");
        list.append("a");
        assert!(list.delete(&"a"));
        assert_eq!(list.to_vec(), vec!["b", "a"]);
    }

    #[test]
    fn nested_map_set_get_replace() {
        let mut map: NestedMap<u32, &str, i32> = NestedMap::new(|a, b| a == b);
        map.set(1, "x", 10);
        map.set(1, "y", 20);
        map.set(1, "x", 11);
        assert_eq!(map.get(&1, &"x"), Some(&11));
        assert_eq!(map.get(&1, &"y"), Some(&20));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn nested_map_delete_last_slot_drops_bucket() {
        let mut map: NestedMap<u32, &str, i32> = NestedMap::new(|a, b| a == b);
        map.set(7, "only", 1);
        assert!(map.contains_outer(&7));
        assert!(map.delete(&7, &"only"));
        assert!(!map.contains_outer(&7));
        assert!(!map.delete(&7, &"only"));
    }

    #[test]
    fn nested_map_iterates_in_insertion_order() {
        let mut map: NestedMap<u32, &str, i32> = NestedMap::new(|a, b| a == b);
        map.set(2, "b", 20);
        map.set(1, "a", 10);
        map.set(2, "c", 21);
        let triples: Vec<_> = map.iter().map(|(k1, k2, v)| (*k1, *k2, *v)).collect();
        assert_eq!(triples, vec![(2, "b", 20), (2, "c", 21), (1, "a", 10)]);
    }

    #[test]
    fn nested_map_custom_equality_sees_through_wrappers() {
        use std::sync::Arc;
        let mut map: NestedMap<u8, Arc<i32>, &str> = NestedMap::new(|a, b| Arc::ptr_eq(a, b));
        let first = Arc::new(5);
        let clone = first.clone();
        let other = Arc::new(5);
        map.set(0, first, "first");
        // Same allocation resolves, a structurally equal value does not.
        assert_eq!(map.get(&0, &clone), Some(&"first"));
        assert_eq!(map.get(&0, &other), None);
    }
}
