use crate::ident::RecordId;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Contract for cache keys.
///
/// Keys must be pointer-free (plain comparable data) and expose a hash wide
/// enough that its low bits select an index shard. `Eq + Hash` drive the
/// per-shard map; `shard_hash` drives shard selection, so a key type decides
/// for itself which of its fields spread load across shards.
pub trait CacheKey: Eq + Hash + Clone {
    /// Hash used for shard selection; the low bits are masked against the
    /// (power-of-two) shard count.
    fn shard_hash(&self) -> u64;
}

/// The key -> identifier index, striped into power-of-two many shards, each
/// behind its own read-write lock.
///
/// Values are packed identifiers, never references, so the maps stay free of
/// traceable edges into the slabs. Lookups take the shard's read lock;
/// mutations take its write lock. Critical sections are single map
/// operations and are the only suspension points in the index.
pub(crate) struct ShardedIndex<K> {
    shards: Box<[RwLock<HashMap<K, RecordId>>]>,
    mask: u64,
}

impl<K: CacheKey> ShardedIndex<K> {
    /// `requested` is rounded up to the next power of two so shard selection
    /// is a single mask.
    pub fn new(requested: usize) -> Self {
        debug_assert!(requested > 0, "shard count validated at construction");
        let size = requested.next_power_of_two();
        let shards = (0..size).map(|_| RwLock::new(HashMap::new())).collect();
        Self {
            shards,
            mask: size as u64 - 1,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: &K) -> &RwLock<HashMap<K, RecordId>> {
        &self.shards[(key.shard_hash() & self.mask) as usize]
    }

    /// Binds `key` to `id`, returning the displaced identifier if the key
    /// was already bound.
    pub fn insert(&self, key: K, id: RecordId) -> Option<RecordId> {
        write_shard(self.shard(&key)).insert(key, id)
    }

    pub fn get(&self, key: &K) -> Option<RecordId> {
        read_shard(self.shard(key)).get(key).copied()
    }

    /// Unbinds `key`, returning the identifier it mapped to.
    pub fn remove(&self, key: &K) -> Option<RecordId> {
        write_shard(self.shard(key)).remove(key)
    }

    /// Total number of bindings, summed across shards without a global lock;
    /// approximate under concurrent mutation.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| read_shard(s).len()).sum()
    }
}

// A panic while holding a shard lock poisons it, but single map calls leave
// the map valid, so the data is safe to keep serving.
fn read_shard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_shard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct TestKey(u64);

    impl CacheKey for TestKey {
        fn shard_hash(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_shard_count_rounds_up() {
        assert_eq!(ShardedIndex::<TestKey>::new(1).shard_count(), 1);
        assert_eq!(ShardedIndex::<TestKey>::new(3).shard_count(), 4);
        assert_eq!(ShardedIndex::<TestKey>::new(8).shard_count(), 8);
    }

    #[test]
    fn test_insert_get_remove() {
        let index = ShardedIndex::new(4);
        let id = RecordId::new_used(0, 7);
        assert_eq!(index.insert(TestKey(1), id), None);
        assert_eq!(index.get(&TestKey(1)), Some(id));
        assert_eq!(index.remove(&TestKey(1)), Some(id));
        assert_eq!(index.get(&TestKey(1)), None);
        assert_eq!(index.remove(&TestKey(1)), None);
    }

    #[test]
    fn test_insert_overwrites_and_returns_displaced() {
        let index = ShardedIndex::new(2);
        let first = RecordId::new_used(0, 1);
        let second = RecordId::new_used(0, 2);
        assert_eq!(index.insert(TestKey(9), first), None);
        assert_eq!(index.insert(TestKey(9), second), Some(first));
        assert_eq!(index.get(&TestKey(9)), Some(second));
    }

    #[test]
    fn test_colliding_hashes_stay_correct() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        struct Collider(u64);
        impl CacheKey for Collider {
            fn shard_hash(&self) -> u64 {
                0 // everything lands on shard 0
            }
        }

        let index = ShardedIndex::new(8);
        for i in 0..100 {
            index.insert(Collider(i), RecordId::new_used(0, i as u32));
        }
        assert_eq!(index.len(), 100);
        for i in 0..100 {
            assert_eq!(index.get(&Collider(i)), Some(RecordId::new_used(0, i as u32)));
        }
    }
}
