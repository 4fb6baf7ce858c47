use crate::ident::FreeRef;
use crate::sync::Backoff;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// Cell handshake values. The flag transitions decouple slot ownership (won by
// the head/tail CAS) from slot content readiness (published by the flag).
const AVAILABLE: u32 = 1 << 31;
const UNAVAILABLE: u32 = 0;

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Head and tail share one 64-bit word (head in the high half, tail in the
// low half) so that every participant observes a single linearizable
// (head, tail) pair. With split atomics a producer can read a stale tail,
// watch a consumer advance both halves, and then conclude `head - tail <
// capacity` for a ring that is actually full. The packed word closes that
// hazard at the cost of funneling both sides through one CAS.
//
// Both halves are free-running u32 counters; only their difference is
// interpreted, so wrap-around at 2^32 is harmless.
//
// Winning the CAS reserves a cell but says nothing about its content. The
// per-cell availability flag carries that second bit of truth:
//
//   pusher:  spin until flag == UNAVAILABLE, write the FreeRef,
//            then store AVAILABLE with Release
//   popper:  spin until flag == AVAILABLE (Acquire, pairing with the
//            pusher's Release), copy the FreeRef out,
//            then store UNAVAILABLE with Release
//
// The content write strictly precedes the Release store of AVAILABLE, so a
// popper can never observe the flag over a half-written cell. The inner
// spins are bounded by the peer's two remaining instructions.
// =============================================================================

/// Ring-mode positioner: a bounded ring of free record positions.
///
/// Capacity must be a power of two. A freshly initialized pool fills the
/// ring completely, so it starts with `head - tail == capacity`.
pub(crate) struct FreeRing {
    /// head (high 32) | tail (low 32).
    seq: CachePadded<AtomicU64>,
    /// Times a pusher lost the CAS or waited on a cell flag.
    push_races: CachePadded<AtomicU64>,
    /// Times a popper lost the CAS or waited on a cell flag.
    pop_races: CachePadded<AtomicU64>,
    cells: Box<[RingCell]>,
    mask: u32,
}

struct RingCell {
    free: UnsafeCell<FreeRef>,
    avail: AtomicU32,
}

// Safety: cell content is only touched by the thread that won the cell via
// the head/tail CAS and the availability handshake; FreeRef is plain data.
unsafe impl Send for FreeRing {}
unsafe impl Sync for FreeRing {}

fn unpack(seq: u64) -> (u32, u32) {
    ((seq >> 32) as u32, seq as u32)
}

fn pack(head: u32, tail: u32) -> u64 {
    u64::from(head) << 32 | u64::from(tail)
}

impl FreeRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        let cells = (0..capacity)
            .map(|_| RingCell {
                free: UnsafeCell::new(FreeRef::EMPTY),
                avail: AtomicU32::new(UNAVAILABLE),
            })
            .collect();
        Self {
            seq: CachePadded::new(AtomicU64::new(0)),
            push_races: CachePadded::new(AtomicU64::new(0)),
            pop_races: CachePadded::new(AtomicU64::new(0)),
            cells,
            mask: capacity as u32 - 1,
        }
    }

    fn capacity(&self) -> u32 {
        self.mask + 1
    }

    /// Pushes a free record position. False when the ring is full - which is
    /// unreachable for callers returning a record they took from this ring.
    pub fn push(&self, free: FreeRef) -> bool {
        let cap = self.capacity();
        loop {
            let seq = self.seq.load(Ordering::Acquire);
            let (head, tail) = unpack(seq);
            let n = head.wrapping_sub(tail);
            if n == cap {
                return false;
            }
            debug_assert!(n < cap, "ring holds more than its capacity");

            if self
                .seq
                .compare_exchange_weak(
                    seq,
                    pack(head.wrapping_add(1), tail),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                self.push_races.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let cell = &self.cells[(head & self.mask) as usize];
            // The previous occupant of this cell may still be mid-pop; wait
            // for it to hand the cell back.
            let mut backoff = Backoff::new();
            while cell.avail.load(Ordering::Acquire) != UNAVAILABLE {
                self.push_races.fetch_add(1, Ordering::Relaxed);
                backoff.snooze();
            }
            // SAFETY: the CAS reserved this cell for us and the flag read
            // above confirmed the previous popper is done with it.
            unsafe { *cell.free.get() = free };
            // Content store above must come first: the Release pairs with a
            // popper's Acquire load of the flag.
            cell.avail.store(AVAILABLE, Ordering::Release);
            return true;
        }
    }

    /// Pops a free record position, or None when the ring is empty.
    pub fn pop(&self) -> Option<FreeRef> {
        loop {
            let seq = self.seq.load(Ordering::Acquire);
            let (head, tail) = unpack(seq);
            if head == tail {
                return None;
            }

            if self
                .seq
                .compare_exchange_weak(
                    seq,
                    pack(head, tail.wrapping_add(1)),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                self.pop_races.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let cell = &self.cells[(tail & self.mask) as usize];
            // The pusher that reserved this cell may not have published yet.
            let mut backoff = Backoff::new();
            while cell.avail.load(Ordering::Acquire) != AVAILABLE {
                self.pop_races.fetch_add(1, Ordering::Relaxed);
                backoff.snooze();
            }
            // SAFETY: the CAS reserved this cell for us and the Acquire load
            // above synchronized with the pusher's Release store.
            let free = unsafe { *cell.free.get() };
            cell.avail.store(UNAVAILABLE, Ordering::Release);
            return Some(free);
        }
    }

    /// Number of free records currently in the ring.
    pub fn free_len(&self) -> usize {
        let (head, tail) = unpack(self.seq.load(Ordering::Acquire));
        head.wrapping_sub(tail) as usize
    }

    /// Spin-race diagnostics: (push side, pop side).
    pub fn races(&self) -> (u64, u64) {
        (
            self.push_races.load(Ordering::Relaxed),
            self.pop_races.load(Ordering::Relaxed),
        )
    }

    #[cfg(test)]
    fn all_available(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| cell.avail.load(Ordering::Acquire) == AVAILABLE)
    }
}
