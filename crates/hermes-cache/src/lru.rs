//! Recency cache (least-recently-used eviction)
//!
//! Entries live in a slab of slots threaded into a doubly-linked recency
//! list, and a hash index maps keys to slot positions. Every operation is
//! O(1). Freed slots are recycled through a free list, so a bounded cache
//! never grows its slab past `capacity + 1` slots.
//!
//! The cache is single-owner (`&mut self`); wrap it in a mutex (see
//! [`SharedCache`](crate::SharedCache)) to share it between tasks.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Sentinel for "no slot"
const NIL: usize = usize::MAX;

struct Slot<K, V> {
    entry: Option<(K, V)>,
    /// Towards the most recently used end
    prev: usize,
    /// Towards the least recently used end
    next: usize,
}

/// Bounded key/value store evicting the least recently touched entry
///
/// A capacity of 0 means unbounded. Both `get` and `set` refresh the
/// recency of a key; only `set` can trigger an eviction.
pub struct RecencyCache<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> RecencyCache<K, V> {
    /// Create a cache holding at most `capacity` entries (0 = unbounded)
    pub fn new(capacity: usize) -> Self {
        RecencyCache {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    /// Configured capacity (0 = unbounded)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Look up a key and mark it as most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        self.slots[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Look up a key without changing its recency
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.slots[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Presence test; does not change recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Insert or overwrite a value and mark the key as most recently used
    ///
    /// Returns the evicted entry when the insert pushed the cache over
    /// capacity.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = self.slots[idx].entry.as_mut() {
                entry.1 = value;
            }
            self.touch(idx);
            return None;
        }

        let idx = self.alloc(key.clone(), value);
        self.index.insert(key, idx);
        self.push_front(idx);

        if self.capacity > 0 && self.index.len() > self.capacity {
            return self.pop_lru();
        }
        None
    }

    /// Remove a key, returning its value
    pub fn pop<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.remove_slot(idx).map(|(_, v)| v)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        if self.tail == NIL {
            return None;
        }
        self.remove_slot(self.tail)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Iterate from most to least recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
        }
    }

    fn alloc(&mut self, key: K, value: V) -> usize {
        let slot = Slot {
            entry: Some((key, value)),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        }
    }

    fn remove_slot(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        self.free.push(idx);
        let entry = self.slots[idx].entry.take()?;
        self.index.remove(&entry.0);
        Some(entry)
    }

    fn touch(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);

        if prev != NIL {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }
}

impl<K: Hash + Eq + Clone, V> Default for RecencyCache<K, V> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<K, V> fmt::Debug for RecencyCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecencyCache")
            .field("len", &self.index.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Iterator over cache entries, most recently used first
pub struct Iter<'a, K, V> {
    slots: &'a [Slot<K, V>],
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor != NIL {
            let slot = &self.slots[self.cursor];
            self.cursor = slot.next;
            if let Some((k, v)) = slot.entry.as_ref() {
                return Some((k, v));
            }
        }
        None
    }
}
