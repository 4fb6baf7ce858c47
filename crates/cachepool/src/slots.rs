use crate::ident::{FreeRef, INVALID_SLOT};
use crate::sync::SpinLock;

/// Slot-mode positioner: a singly-linked stack of free record positions.
///
/// Cell `i` permanently describes record `i`; the only mutable state is the
/// head of the free list and the `next` links, both touched only inside the
/// spin lock's two-step critical sections. No pointers anywhere - links are
/// cell indices, terminated by the shared invalid marker.
pub(crate) struct SlotList {
    inner: SpinLock<FreeList>,
}

struct FreeList {
    /// Most recently released cell, or `INVALID_SLOT` when empty.
    head: u32,
    cells: Box<[SlotCell]>,
}

struct SlotCell {
    free: FreeRef,
    next: u32,
}

impl FreeList {
    fn invalid(&self, id: u32) -> bool {
        id & INVALID_SLOT != 0 || id as usize >= self.cells.len()
    }
}

impl SlotList {
    /// Builds the list with every cell free, lowest index on top.
    pub fn new(pool: u32, capacity: usize) -> Self {
        let cells = (0..capacity)
            .map(|i| SlotCell {
                free: FreeRef {
                    pool,
                    index: i as u32,
                },
                next: if i + 1 < capacity {
                    i as u32 + 1
                } else {
                    INVALID_SLOT
                },
            })
            .collect();
        Self {
            inner: SpinLock::new(FreeList { head: 0, cells }),
        }
    }

    /// Pops the most recently freed record, or None when every record is out.
    pub fn acquire(&self) -> Option<FreeRef> {
        let mut list = self.inner.lock();
        let id = list.head;
        if list.invalid(id) {
            return None;
        }
        let next = list.cells[id as usize].next;
        list.head = next;
        Some(list.cells[id as usize].free)
    }

    /// Pushes a record back on the free list. False if the cell index is out
    /// of range (a corrupt identifier; the record stays leaked rather than
    /// corrupting the list).
    pub fn release(&self, free: FreeRef) -> bool {
        let mut list = self.inner.lock();
        let id = free.index;
        if list.invalid(id) {
            return false;
        }
        let head = list.head;
        list.cells[id as usize].next = head;
        list.head = id;
        true
    }

    /// Number of free records currently on the list. Diagnostic only; walks
    /// the links under the lock.
    pub fn free_len(&self) -> usize {
        let list = self.inner.lock();
        let mut n = 0;
        let mut id = list.head;
        while !list.invalid(id) {
            n += 1;
            id = list.cells[id as usize].next;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_full_lowest_first() {
        let list = SlotList::new(0, 4);
        assert_eq!(list.free_len(), 4);
        let first = list.acquire().unwrap();
        assert_eq!(first.index, 0);
    }

    #[test]
    fn test_lifo_order() {
        let list = SlotList::new(0, 4);
        let a = list.acquire().unwrap();
        let b = list.acquire().unwrap();
        assert!(list.release(a));
        assert!(list.release(b));
        // b went back last, so it comes out first.
        assert_eq!(list.acquire().unwrap().index, b.index);
        assert_eq!(list.acquire().unwrap().index, a.index);
    }

    #[test]
    fn test_drains_to_empty() {
        let list = SlotList::new(2, 3);
        for _ in 0..3 {
            let free = list.acquire().unwrap();
            assert_eq!(free.pool, 2);
        }
        assert!(list.acquire().is_none());
        assert_eq!(list.free_len(), 0);
    }

    #[test]
    fn test_release_rejects_out_of_range() {
        let list = SlotList::new(0, 2);
        assert!(!list.release(FreeRef { pool: 0, index: 7 }));
        assert!(!list.release(FreeRef {
            pool: 0,
            index: INVALID_SLOT,
        }));
        assert_eq!(list.free_len(), 2);
    }

    #[test]
    fn test_acquire_release_restores_membership() {
        let list = SlotList::new(0, 8);
        let free = list.acquire().unwrap();
        assert_eq!(list.free_len(), 7);
        assert!(list.release(free));
        assert_eq!(list.free_len(), 8);
    }
}
