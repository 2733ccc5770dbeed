//! Fixed-capacity LRU cache for inference results.
//!
//! The cache is two structures kept in bijection: a `HashMap` from key to
//! slot for O(1) lookup, and a slab-backed doubly linked recency list for
//! O(1) promotion and eviction. The list stores nodes in a `Vec` and
//! links them by index, with freed slots recycled through a free list, so
//! no per-entry allocation happens after warm-up.
//!
//! All operations are serialized by one mutex. Hit/miss counters are
//! atomics and may be read outside the lock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

struct ListNode<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list over a slab of slots. Head is the LRU end, tail is
/// the MRU end.
struct RecencyList<K, V> {
    slots: Vec<Option<ListNode<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K, V> RecencyList<K, V> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn node(&self, idx: usize) -> &ListNode<K, V> {
        self.slots[idx]
            .as_ref()
            .expect("recency list slot is vacant")
    }

    fn node_mut(&mut self, idx: usize) -> &mut ListNode<K, V> {
        self.slots[idx]
            .as_mut()
            .expect("recency list slot is vacant")
    }

    fn value(&self, idx: usize) -> &V {
        &self.node(idx).value
    }

    fn value_mut(&mut self, idx: usize) -> &mut V {
        &mut self.node_mut(idx).value
    }

    /// Appends at the MRU end and returns the slot index.
    fn push_back(&mut self, key: K, value: V) -> usize {
        let node = ListNode {
            key,
            value,
            prev: self.tail,
            next: None,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(old_tail) = self.tail {
            self.node_mut(old_tail).next = Some(idx);
        } else {
            self.head = Some(idx);
        }
        self.tail = Some(idx);
        self.len += 1;
        idx
    }

    /// Removes and returns the LRU entry.
    fn pop_front(&mut self) -> Option<(K, V)> {
        let head = self.head?;
        let node = self.slots[head]
            .take()
            .expect("recency list head is vacant");

        self.head = node.next;
        match node.next {
            Some(next) => self.node_mut(next).prev = None,
            None => self.tail = None,
        }

        self.free.push(head);
        self.len -= 1;
        Some((node.key, node.value))
    }

    /// Moves an existing slot to the MRU end.
    fn move_to_back(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }

        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };

        // Unlink from the current position.
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.node_mut(n).prev = prev;
        }

        // Relink at the tail.
        let old_tail = self.tail.expect("list with a linked node has a tail");
        self.node_mut(old_tail).next = Some(idx);
        let node = self.node_mut(idx);
        node.prev = Some(old_tail);
        node.next = None;
        self.tail = Some(idx);
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Keys from LRU to MRU, for assertions.
    #[cfg(test)]
    fn keys_in_order(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.node(idx);
            keys.push(&node.key);
            cursor = node.next;
        }
        keys
    }
}

struct CacheInner<K, V> {
    index: HashMap<K, usize>,
    list: RecencyList<K, V>,
}

/// Thread-safe LRU cache with hit/miss accounting.
///
/// Capacity is fixed at construction; inserting past capacity evicts the
/// least recently touched entry. `get` counts as a touch.
pub struct LruCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Clone + Eq + Hash, V: Clone> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            inner: Mutex::new(CacheInner {
                index: HashMap::new(),
                list: RecencyList::new(),
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a key, promoting it to most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        match inner.index.get(key).copied() {
            Some(slot) => {
                inner.list.move_to_back(slot);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(inner.list.value(slot).clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or overwrites a key, promoting it to most recently used.
    ///
    /// Inserting a new key at capacity evicts the least recently used
    /// entry.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        if let Some(slot) = inner.index.get(&key).copied() {
            *inner.list.value_mut(slot) = value;
            inner.list.move_to_back(slot);
            return;
        }

        let slot = inner.list.push_back(key.clone(), value);
        inner.index.insert(key, slot);

        if inner.list.len() > self.capacity {
            if let Some((evicted, _)) = inner.list.pop_front() {
                inner.index.remove(&evicted);
            }
        }
    }

    /// Drops every entry and resets the hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.index.clear();
        inner.list.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").list.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
