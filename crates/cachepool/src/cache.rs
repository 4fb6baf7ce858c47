use crate::config::Config;
use crate::error::Error;
use crate::ident::RecordId;
use crate::pool::Pool;
use crate::shard::{CacheKey, ShardedIndex};
use log::{debug, warn};
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Handle to an acquired record: the payload view plus the packed
/// identifier, in one value.
///
/// A handle pins its pool (pools are never destroyed, so this is an identity,
/// not a lifetime crutch) and addresses one record by index. Handles are
/// cheap to clone so they can be passed around alongside the key; the
/// *access right* they represent follows the record's used-flag hand-off -
/// the payload belongs to whoever currently owns the identifier, and it is
/// the collaborator's job not to write through two clones at once.
pub struct ValueRef<V> {
    pool: Arc<Pool<V>>,
    id: RecordId,
}

impl<V> ValueRef<V> {
    fn new(pool: Arc<Pool<V>>, id: RecordId) -> Self {
        debug_assert!(pool.contains(id.index()));
        Self { pool, id }
    }

    /// The packed identifier for this record. Stable for the life of the
    /// process; this is what [`CachePool::store`] writes into the index.
    pub fn id(&self) -> RecordId {
        self.id
    }

    fn value_ptr(&self) -> *mut V {
        match self.pool.record(self.id.index()) {
            Some(record) => record.value_ptr(),
            // Handles are only constructed over validated indices.
            None => unreachable!("record index out of range in a live handle"),
        }
    }

    /// Copies the payload out.
    pub fn read(&self) -> V
    where
        V: Copy,
    {
        // SAFETY: the holder of a used record has exclusive payload access;
        // see the type-level contract.
        unsafe { *self.value_ptr() }
    }

    /// Overwrites the payload.
    pub fn write(&self, value: V) {
        // SAFETY: as in `read`.
        unsafe { *self.value_ptr() = value };
    }

    /// Mutates the payload in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        // SAFETY: as in `read`; the reference does not escape the closure.
        f(unsafe { &mut *self.value_ptr() })
    }
}

impl<V> Clone for ValueRef<V> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            id: self.id,
        }
    }
}

/// Two handles are equal iff they address the same record of the same pool.
impl<V> PartialEq for ValueRef<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pool, &other.pool) && self.id == other.id
    }
}

impl<V> Eq for ValueRef<V> {}

impl<V> std::fmt::Debug for ValueRef<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueRef").field(&self.id).finish()
    }
}

/// Aggregate diagnostics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Current pool count.
    pub pools: usize,
    /// Index shard count (fixed at construction).
    pub shards: usize,
    /// Total records across all pools.
    pub capacity: usize,
    /// Records currently free (approximate under concurrency).
    pub free_records: usize,
    /// Keys currently bound in the index (approximate under concurrency).
    pub keys: usize,
    /// Ring-mode spin races on the release side, summed over pools.
    pub release_races: u64,
    /// Ring-mode spin races on the acquire side, summed over pools.
    pub acquire_races: u64,
}

struct Inner<K, V> {
    config: Config,
    /// The write lock doubles as the extension lock: appends happen only
    /// while it is held.
    pools: RwLock<Vec<Arc<Pool<V>>>>,
    index: ShardedIndex<K>,
}

/// A keyed cache drawing its values from pre-allocated record pools.
///
/// The struct is a thin `Arc` wrapper: cloning shares the same pools and
/// index. All operations take `&self` and are safe to call from any thread.
pub struct CachePool<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for CachePool<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// Per-thread probe rotor: concurrent callers start their pool scans at
// different offsets, and repeat callers rotate, spreading contention without
// any shared state on the hot path.
static PROBE_SEED: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static PROBE_ROTOR: Cell<usize> =
        Cell::new(PROBE_SEED.fetch_add(1, Ordering::Relaxed));
}

fn probe_start() -> usize {
    PROBE_ROTOR.with(|rotor| {
        let v = rotor.get();
        rotor.set(v.wrapping_add(1));
        v
    })
}

impl<K: CacheKey, V: Default> CachePool<K, V> {
    /// Builds the initial pool set and the sharded index.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let mut pools = Vec::with_capacity(config.pool_count);
        for i in 0..config.pool_count {
            pools.push(Arc::new(Pool::new(
                i as u32,
                config.pool_capacity,
                config.mode,
            )?));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                index: ShardedIndex::new(config.effective_shards()),
                pools: RwLock::new(pools),
                config,
            }),
        })
    }

    /// Acquires a free record from some pool.
    ///
    /// Probes every pool starting at a per-thread offset; if all are
    /// exhausted and auto-extension is on, appends a pool (bounded by
    /// `max_pools`) and returns a record from it. The new pool's record is
    /// taken while the extension lock is still held, so the caller that
    /// paid for the extension always gets one.
    pub fn acquire(&self) -> Result<ValueRef<V>, Error> {
        let mut start = probe_start();
        loop {
            let observed = {
                let pools = read_lock(&self.inner.pools);
                let n = pools.len();
                for k in 0..n {
                    let pool = &pools[(start + k) % n];
                    if let Some(id) = pool.acquire() {
                        return Ok(ValueRef::new(Arc::clone(pool), id));
                    }
                }
                n
            };

            if !self.inner.config.auto_extend {
                return Err(Error::Exhausted { pools: observed });
            }

            let mut pools = write_lock(&self.inner.pools);
            if pools.len() > observed {
                // Someone else extended between our scan and the lock;
                // rescan starting at the newest pool.
                start = pools.len() - 1;
                drop(pools);
                continue;
            }
            if self.inner.config.max_pools != 0 && pools.len() >= self.inner.config.max_pools {
                return Err(Error::Exhausted { pools: pools.len() });
            }

            let pool = Arc::new(Pool::new(
                pools.len() as u32,
                self.inner.config.pool_capacity,
                self.inner.config.mode,
            )?);
            let Some(id) = pool.acquire() else {
                panic!("freshly constructed pool yielded no record");
            };
            pools.push(Arc::clone(&pool));
            debug!(
                "extended to {} pools of {} records",
                pools.len(),
                self.inner.config.pool_capacity
            );
            return Ok(ValueRef::new(pool, id));
        }
    }
}

impl<K: CacheKey, V> CachePool<K, V> {
    /// Returns a record to its pool. The handle is consumed; clones of it
    /// must not be used to touch the payload afterwards.
    pub fn release(&self, value: ValueRef<V>) -> Result<(), Error> {
        value.pool.release(value.id)
    }

    /// Binds `key` to the record behind `value`, replacing any prior
    /// binding. A displaced record is NOT freed - it is returned so the
    /// caller can release or re-store it.
    pub fn store(&self, key: K, value: &ValueRef<V>) -> Option<ValueRef<V>> {
        let displaced = self.inner.index.insert(key, value.id())?;
        self.resolve(displaced)
    }

    /// Looks up the record bound to `key`.
    ///
    /// Returns None for unbound keys, and for bound identifiers that no
    /// longer decode to an existing record (defensive against corruption).
    pub fn load(&self, key: &K) -> Option<ValueRef<V>> {
        self.resolve(self.inner.index.get(key)?)
    }

    /// Unbinds `key` without freeing the record - the caller still holds it.
    /// True iff a binding existed.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.index.remove(key).is_some()
    }

    /// Unbinds `key` and returns the record to its pool. True iff a record
    /// was freed; a repeat call for the same binding returns false.
    pub fn remove_and_release(&self, key: &K) -> bool {
        let Some(id) = self.inner.index.remove(key) else {
            return false;
        };
        match self.release_id(id) {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to free record for removed key: {err}");
                false
            }
        }
    }

    fn resolve(&self, id: RecordId) -> Option<ValueRef<V>> {
        let pools = read_lock(&self.inner.pools);
        let Some(pool) = pools.get(id.pool() as usize) else {
            warn!("index held identifier for nonexistent pool: {id}");
            return None;
        };
        if !pool.contains(id.index()) {
            warn!("index held out-of-range identifier: {id}");
            return None;
        }
        Some(ValueRef::new(Arc::clone(pool), id))
    }

    fn release_id(&self, id: RecordId) -> Result<(), Error> {
        let pool = {
            let pools = read_lock(&self.inner.pools);
            match pools.get(id.pool() as usize) {
                Some(pool) => Arc::clone(pool),
                None => return Err(Error::CorruptId { id }),
            }
        };
        pool.release(id)
    }

    /// Current number of pools.
    pub fn pool_count(&self) -> usize {
        read_lock(&self.inner.pools).len()
    }

    /// Total record capacity across all pools.
    pub fn capacity(&self) -> usize {
        read_lock(&self.inner.pools)
            .iter()
            .map(|p| p.capacity())
            .sum()
    }

    /// Number of keys currently bound.
    pub fn len(&self) -> usize {
        self.inner.index.len()
    }

    /// True if no keys are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Diagnostics snapshot, aggregated over all pools.
    pub fn stats(&self) -> CacheStats {
        let pools = read_lock(&self.inner.pools);
        let mut stats = CacheStats {
            pools: pools.len(),
            shards: self.inner.index.shard_count(),
            keys: self.inner.index.len(),
            ..CacheStats::default()
        };
        for pool in pools.iter() {
            stats.capacity += pool.capacity();
            stats.free_records += pool.free_records();
            let (push, pop) = pool.spin_races();
            stats.release_races += push;
            stats.acquire_races += pop;
        }
        stats
    }
}

// See shard.rs: single-operation critical sections leave the Vec valid, so
// poisoning is recovered rather than propagated.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
