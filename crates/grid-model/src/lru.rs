//! Insertion-ordered LRU map.
//!
//! Backing structure for the text-width, formatted-text, badge-width and
//! bitmap caches: a hash map from key to slot index plus an intrusive
//! doubly-linked order over the slots. `get` and `insert` both touch the
//! entry to the most-recent end; eviction pops from the oldest end and hands
//! the entry back so callers can dispose resources (bitmap close).
//!
//! Invariants:
//! * `map.len() == live slot count`; free slots are recycled via a free list.
//! * `head` is the oldest entry, `tail` the most recent.

use ahash::AHashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct LruCache<K, V> {
    map: AHashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: AHashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up and touch.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.slots[idx].as_ref().map(|s| &s.value)
    }

    /// Look up without touching (used by pure predicates).
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.slots[idx].as_ref().map(|s| &s.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.slots[idx].as_mut().map(|s| &mut s.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace, touching the entry. Returns the replaced value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            self.touch(idx);
            let slot = self.slots[idx].as_mut().expect("live slot");
            return Some(std::mem::replace(&mut slot.value, value));
        }
        let idx = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        self.slots[idx] = Some(Slot {
            key: key.clone(),
            value,
            prev: self.tail,
            next: NIL,
        });
        if self.tail != NIL {
            self.slots[self.tail].as_mut().expect("live tail").next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
        self.map.insert(key, idx);
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        let slot = self.slots[idx].take().expect("live slot");
        self.free.push(idx);
        Some(slot.value)
    }

    /// Pop the least-recently-used entry.
    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.unlink(idx);
        let slot = self.slots[idx].take().expect("live head");
        self.map.remove(&slot.key);
        self.free.push(idx);
        Some((slot.key, slot.value))
    }

    /// Oldest key without removing it.
    pub fn oldest_key(&self) -> Option<&K> {
        if self.head == NIL {
            return None;
        }
        self.slots[self.head].as_ref().map(|s| &s.key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Iterate values oldest → newest without touching.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        let mut idx = self.head;
        std::iter::from_fn(move || {
            if idx == NIL {
                return None;
            }
            let slot = self.slots[idx].as_ref().expect("live slot");
            idx = slot.next;
            Some(&slot.value)
        })
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let slot = self.slots[idx].as_ref().expect("live slot");
            (slot.prev, slot.next)
        };
        if prev != NIL {
            self.slots[prev].as_mut().expect("live prev").next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].as_mut().expect("live next").prev = prev;
        } else {
            self.tail = prev;
        }
    }

    /// Move a live slot to the most-recent end.
    fn touch(&mut self, idx: usize) {
        if self.tail == idx {
            return;
        }
        self.unlink(idx);
        let tail = self.tail;
        {
            let slot = self.slots[idx].as_mut().expect("live slot");
            slot.prev = tail;
            slot.next = NIL;
        }
        if tail != NIL {
            self.slots[tail].as_mut().expect("live tail").next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
    }
}

impl<K: Eq + Hash + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
