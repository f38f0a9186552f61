//! Expiring LRU (Least Recently Used) map
//!
//! Slab-backed doubly-linked list for O(1) eviction. Each entry may carry a
//! deadline; expired entries are dropped lazily on lookup or by
//! [`ExpiringLru::purge_expired`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use ahash::RandomState;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    expires_at: Option<Instant>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> Node<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// Outcome of a lookup
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Live entry
    Hit(V),
    /// Entry existed but its deadline had passed; it has been removed
    Expired,
    /// No entry
    Miss,
}

/// LRU map with fixed capacity and optional per-entry deadlines
pub struct ExpiringLru<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> ExpiringLru<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new map holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            map: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
        }
    }

    /// Look up `key`, promoting it on a hit and dropping it if expired
    pub fn get(&mut self, key: &K, now: Instant) -> Lookup<V> {
        let Some(&idx) = self.map.get(key) else {
            return Lookup::Miss;
        };

        let expired = self.nodes[idx].as_ref().is_some_and(|node| node.is_expired(now));
        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        self.move_to_front(idx);
        match &self.nodes[idx] {
            Some(node) => Lookup::Hit(node.value.clone()),
            None => Lookup::Miss,
        }
    }

    /// Insert or replace `key`. Returns `true` when a live entry had to be
    /// evicted to make room.
    pub fn put(&mut self, key: K, value: V, expires_at: Option<Instant>) -> bool {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = &mut self.nodes[idx] {
                node.value = value;
                node.expires_at = expires_at;
            }
            self.move_to_front(idx);
            return false;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.evict_tail()
        } else {
            false
        };

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            expires_at,
            prev: None,
            next: self.head,
        });

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);
        evicted
    }

    /// Remove `key`, returning its value if present
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free_list.push(idx);
        self.nodes[idx].take().map(|node| node.value)
    }

    /// Drop every entry whose deadline is at or before `now`
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<K> = self
            .nodes
            .iter()
            .flatten()
            .filter(|node| node.is_expired(now))
            .map(|node| node.key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Number of entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &self.nodes[idx] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = None;
        }
    }

    fn evict_tail(&mut self) -> bool {
        let Some(tail_idx) = self.tail else {
            return false;
        };
        let key = match &self.nodes[tail_idx] {
            Some(node) => node.key.clone(),
            None => return false,
        };
        self.remove(&key).is_some()
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lru_basic() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(2);

        lru.put(1, "a", None);
        lru.put(2, "b", None);

        assert_eq!(lru.get(&1, now), Lookup::Hit("a"));
        assert_eq!(lru.get(&2, now), Lookup::Hit("b"));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_eviction() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(2);

        assert!(!lru.put(1, "a", None));
        assert!(!lru.put(2, "b", None));
        assert!(lru.put(3, "c", None)); // evicts 1

        assert_eq!(lru.get(&1, now), Lookup::Miss);
        assert_eq!(lru.get(&2, now), Lookup::Hit("b"));
        assert_eq!(lru.get(&3, now), Lookup::Hit("c"));
    }

    #[test]
    fn test_lru_promotion() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(2);

        lru.put(1, "a", None);
        lru.put(2, "b", None);
        lru.get(&1, now);
        lru.put(3, "c", None); // evicts 2

        assert_eq!(lru.get(&1, now), Lookup::Hit("a"));
        assert_eq!(lru.get(&2, now), Lookup::Miss);
        assert_eq!(lru.get(&3, now), Lookup::Hit("c"));
    }

    #[test]
    fn test_lru_expiry() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(4);

        lru.put("short", 1, Some(now + Duration::from_secs(1)));
        lru.put("long", 2, Some(now + Duration::from_secs(60)));
        lru.put("forever", 3, None);

        let later = now + Duration::from_secs(2);
        assert_eq!(lru.get(&"short", later), Lookup::Expired);
        assert_eq!(lru.get(&"short", later), Lookup::Miss);
        assert_eq!(lru.get(&"long", later), Lookup::Hit(2));
        assert_eq!(lru.get(&"forever", later), Lookup::Hit(3));
    }

    #[test]
    fn test_lru_purge_expired() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(4);

        lru.put(1, "a", Some(now));
        lru.put(2, "b", Some(now));
        lru.put(3, "c", None);

        assert_eq!(lru.purge_expired(now), 2);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get(&3, now), Lookup::Hit("c"));
    }

    #[test]
    fn test_lru_overwrite_resets_deadline() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(2);

        lru.put(1, "a", Some(now));
        lru.put(1, "b", None);

        assert_eq!(lru.get(&1, now + Duration::from_secs(5)), Lookup::Hit("b"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_remove_and_clear() {
        let now = Instant::now();
        let mut lru = ExpiringLru::new(3);

        lru.put(1, "a", None);
        lru.put(2, "b", None);
        lru.put(3, "c", None);

        assert_eq!(lru.remove(&2), Some("b"));
        assert_eq!(lru.remove(&2), None);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.get(&2, now), Lookup::Miss);

        lru.clear();
        assert!(lru.is_empty());
    }
}
