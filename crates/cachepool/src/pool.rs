use crate::config::{validate_capacity, PositionerMode};
use crate::error::Error;
use crate::ident::{FreeRef, RecordId};
use crate::ring::FreeRing;
use crate::slab::{Record, Slab};
use crate::slots::SlotList;
use log::warn;

/// The data structure tracking which of a pool's records are free.
pub(crate) enum Positioner {
    Slots(SlotList),
    Ring(FreeRing),
}

impl Positioner {
    fn acquire(&self) -> Option<FreeRef> {
        match self {
            Positioner::Slots(slots) => slots.acquire(),
            Positioner::Ring(ring) => ring.pop(),
        }
    }

    fn release(&self, free: FreeRef) -> bool {
        match self {
            Positioner::Slots(slots) => slots.release(free),
            Positioner::Ring(ring) => ring.push(free),
        }
    }

    fn free_len(&self) -> usize {
        match self {
            Positioner::Slots(slots) => slots.free_len(),
            Positioner::Ring(ring) => ring.free_len(),
        }
    }

    fn races(&self) -> (u64, u64) {
        match self {
            Positioner::Slots(_) => (0, 0),
            Positioner::Ring(ring) => ring.races(),
        }
    }
}

/// One slab of records plus the positioner tracking its free set.
///
/// Immutable after construction except through the positioner's and the
/// record headers' concurrency-safe operations.
pub struct Pool<V> {
    index: u32,
    slab: Slab<V>,
    positioner: Positioner,
}

impl<V: Default> Pool<V> {
    /// Builds a pool with every record free.
    pub fn new(index: u32, capacity: usize, mode: PositionerMode) -> Result<Self, Error> {
        validate_capacity(capacity, mode)?;
        let slab = Slab::new(index, capacity);
        let positioner = match mode {
            PositionerMode::Slots => Positioner::Slots(SlotList::new(index, capacity)),
            PositionerMode::Ring => {
                let ring = FreeRing::new(capacity);
                for i in 0..capacity {
                    let pushed = ring.push(FreeRef {
                        pool: index,
                        index: i as u32,
                    });
                    debug_assert!(pushed, "fresh ring rejected its own record");
                }
                Positioner::Ring(ring)
            }
        };
        Ok(Self {
            index,
            slab,
            positioner,
        })
    }
}

impl<V> Pool<V> {
    /// Index of this pool within its cache pool.
    pub fn pool_index(&self) -> u32 {
        self.index
    }

    /// Number of records in the slab.
    pub fn capacity(&self) -> usize {
        self.slab.capacity()
    }

    /// True iff the record index addresses a record in this pool's slab.
    pub fn contains(&self, index: u32) -> bool {
        (index as usize) < self.slab.capacity()
    }

    /// Number of records currently free. Diagnostic; may be stale by the
    /// time it is read under concurrency.
    pub fn free_records(&self) -> usize {
        self.positioner.free_len()
    }

    /// Positioner spin-race diagnostics: (release side, acquire side).
    /// Always (0, 0) in slot mode.
    pub fn spin_races(&self) -> (u64, u64) {
        self.positioner.races()
    }

    /// Takes a free record, marks it used, and returns its identifier.
    /// None when every record is out.
    ///
    /// # Panics
    ///
    /// Panics if the positioner hands out a record already in the used
    /// state; the free set has been duplicated and no recovery is possible.
    pub fn acquire(&self) -> Option<RecordId> {
        let free = self.positioner.acquire()?;
        debug_assert_eq!(free.pool, self.index, "positioner crossed pools");
        let Some(record) = self.slab.record(free.index) else {
            warn!(
                "pool {}: positioner produced out-of-range record index {}",
                self.index, free.index
            );
            return None;
        };
        record.header().mark_used();
        Some(RecordId::new_used(self.index, free.index))
    }

    /// Returns a record to the free set.
    ///
    /// # Panics
    ///
    /// Panics if the record was not in the used state; a double release
    /// breaks the free-set invariants.
    pub fn release(&self, id: RecordId) -> Result<(), Error> {
        if id.pool() != self.index {
            return Err(Error::WrongPool { id, pool: self.index });
        }
        let Some(record) = self.slab.record(id.index()) else {
            return Err(Error::CorruptId { id });
        };
        // The used flag must drop before the positioner can re-surface the
        // record to another caller.
        record.header().clear_used();
        let returned = self.positioner.release(FreeRef {
            pool: self.index,
            index: id.index(),
        });
        debug_assert!(returned, "positioner rejected a record from its own pool");
        Ok(())
    }

    pub(crate) fn record(&self, index: u32) -> Option<&Record<V>> {
        self.slab.record(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(mode: PositionerMode) -> Pool<u64> {
        Pool::new(0, 4, mode).unwrap()
    }

    #[test]
    fn test_acquire_marks_used() {
        for mode in [PositionerMode::Slots, PositionerMode::Ring] {
            let p = pool(mode);
            let id = p.acquire().unwrap();
            assert!(id.is_used());
            assert!(p.record(id.index()).unwrap().header().is_used());
            assert_eq!(p.free_records(), 3);
        }
    }

    #[test]
    fn test_exhaustion_then_release_recovers() {
        for mode in [PositionerMode::Slots, PositionerMode::Ring] {
            let p = pool(mode);
            let ids: Vec<_> = (0..4).map(|_| p.acquire().unwrap()).collect();
            assert!(p.acquire().is_none());
            p.release(ids[2]).unwrap();
            let id = p.acquire().unwrap();
            assert_eq!(id.index(), ids[2].index());
        }
    }

    #[test]
    fn test_release_wrong_pool() {
        let p = pool(PositionerMode::Slots);
        let id = RecordId::new_used(9, 0);
        assert_eq!(p.release(id), Err(Error::WrongPool { id, pool: 0 }));
    }

    #[test]
    fn test_release_out_of_range_index() {
        let p = pool(PositionerMode::Slots);
        let id = RecordId::new_used(0, 100);
        assert_eq!(p.release(id), Err(Error::CorruptId { id }));
    }

    #[test]
    #[should_panic(expected = "released while not in use")]
    fn test_double_release_panics() {
        let p = pool(PositionerMode::Slots);
        let id = p.acquire().unwrap();
        p.release(id).unwrap();
        p.release(id).unwrap();
    }

    #[test]
    fn test_free_plus_used_is_capacity() {
        for mode in [PositionerMode::Slots, PositionerMode::Ring] {
            let p = pool(mode);
            let mut held = Vec::new();
            for step in 0..4 {
                held.push(p.acquire().unwrap());
                assert_eq!(p.free_records() + held.len(), p.capacity(), "mode {mode:?} step {step}");
            }
            for id in held.drain(..) {
                p.release(id).unwrap();
            }
            assert_eq!(p.free_records(), 4);
        }
    }

    #[test]
    fn test_ring_mode_rejects_odd_capacity() {
        assert!(Pool::<u64>::new(0, 6, PositionerMode::Ring).is_err());
        assert!(Pool::<u64>::new(0, 6, PositionerMode::Slots).is_ok());
    }
}
