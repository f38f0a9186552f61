//! In-process memo, partitioned by bound instance

use std::collections::HashMap;

use ahash::RandomState;
use parking_lot::RwLock;

use crate::instance::InstanceId;

/// Partition for calls made without an instance
pub(crate) type Partition = Option<InstanceId>;

type Entries<V> = HashMap<String, V, RandomState>;

/// Memoized values, one map per instance
///
/// Partitions are created on first store and live until cleared; entries
/// never expire on their own.
pub(crate) struct MemoStore<V> {
    partitions: RwLock<HashMap<Partition, Entries<V>, RandomState>>,
}

impl<V: Clone> MemoStore<V> {
    pub(crate) fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    pub(crate) fn get(&self, partition: Partition, key: &str) -> Option<V> {
        self.partitions
            .read()
            .get(&partition)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    pub(crate) fn insert(&self, partition: Partition, key: String, value: V) {
        self.partitions
            .write()
            .entry(partition)
            .or_insert_with(|| HashMap::with_hasher(RandomState::new()))
            .insert(key, value);
    }

    pub(crate) fn remove(&self, partition: Partition, key: &str) -> bool {
        let mut partitions = self.partitions.write();
        let Some(entries) = partitions.get_mut(&partition) else {
            return false;
        };
        let removed = entries.remove(key).is_some();
        if entries.is_empty() {
            partitions.remove(&partition);
        }
        removed
    }

    /// Drop one partition, returning how many entries it held
    pub(crate) fn clear_partition(&self, partition: Partition) -> usize {
        self.partitions
            .write()
            .remove(&partition)
            .map_or(0, |entries| entries.len())
    }

    pub(crate) fn clear(&self) {
        self.partitions.write().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.partitions.read().values().map(HashMap::len).sum()
    }

    pub(crate) fn partition_len(&self, partition: Partition) -> usize {
        self.partitions
            .read()
            .get(&partition)
            .map_or(0, HashMap::len)
    }

    pub(crate) fn partitions(&self) -> usize {
        self.partitions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions_are_independent() {
        let memo = MemoStore::new();
        let a = Some(InstanceId::from_raw(1));
        let b = Some(InstanceId::from_raw(2));

        memo.insert(a, "k".to_string(), 1);
        assert_eq!(memo.get(a, "k"), Some(1));
        assert_eq!(memo.get(b, "k"), None);
        assert_eq!(memo.get(None, "k"), None);

        memo.insert(b, "k".to_string(), 2);
        assert!(memo.remove(a, "k"));
        assert_eq!(memo.get(b, "k"), Some(2));
        assert_eq!(memo.partitions(), 1);
    }

    #[test]
    fn test_remove_missing() {
        let memo: MemoStore<i32> = MemoStore::new();
        assert!(!memo.remove(None, "k"));
    }

    #[test]
    fn test_clear() {
        let memo = MemoStore::new();
        let a = Some(InstanceId::from_raw(1));

        memo.insert(a, "x".to_string(), 1);
        memo.insert(a, "y".to_string(), 2);
        memo.insert(None, "x".to_string(), 3);
        assert_eq!(memo.len(), 3);
        assert_eq!(memo.partition_len(a), 2);

        assert_eq!(memo.clear_partition(a), 2);
        assert_eq!(memo.len(), 1);

        memo.clear();
        assert_eq!(memo.len(), 0);
        assert_eq!(memo.partitions(), 0);
    }
}
