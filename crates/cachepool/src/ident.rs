use std::fmt;

/// High bit of a record descriptor: set while the record is handed out.
pub(crate) const USED_FLAG: u32 = 1 << 31;

/// Low 31 bits of a record descriptor: the record index within its pool.
pub(crate) const INDEX_MASK: u32 = USED_FLAG - 1;

/// Free-list terminator. Shares the flag bit, so any flagged value reads as
/// "no slot" to the slot-mode positioner.
pub(crate) const INVALID_SLOT: u32 = USED_FLAG;

/// Largest per-pool record capacity: indices must fit in 31 bits, and the
/// all-ones index is reserved for [`RecordId::INVALID`].
pub const MAX_POOL_CAPACITY: usize = (INDEX_MASK - 1) as usize;

/// Packed 64-bit record identifier - the only currency that crosses component
/// boundaries.
///
/// Layout:
///
/// ```text
/// 63            32 31 30                    0
/// +--------------+--+-----------------------+
/// |  pool index  |U |     record index      |
/// +--------------+--+-----------------------+
/// ```
///
/// `U` is the used flag; every identifier stored in the index has it set. The
/// low half is a record index into the owning pool's slab, never a raw
/// address, so decoding is always bounds-checked. The bit layout is stable:
/// [`to_bits`](Self::to_bits) / [`from_bits`](Self::from_bits) round-trip it
/// for callers that persist identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u64);

impl RecordId {
    /// Distinguished "no record" value: used flag set, reserved index, pool 0.
    pub const INVALID: Self = Self((USED_FLAG | INDEX_MASK) as u64);

    /// Packs a (pool, record) pair with the used flag set.
    pub(crate) fn new_used(pool: u32, index: u32) -> Self {
        debug_assert!(index & USED_FLAG == 0, "record index overflows 31 bits");
        Self(u64::from(pool) << 32 | u64::from(index | USED_FLAG))
    }

    /// Reconstructs an identifier from its persisted bit pattern.
    ///
    /// The result is not trusted: resolving it goes through the same pool and
    /// index bounds checks as any other identifier.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the persistable bit pattern.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Index of the owning pool.
    pub fn pool(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Record index within the owning pool's slab.
    pub fn index(self) -> u32 {
        self.0 as u32 & INDEX_MASK
    }

    /// True while the identified record is handed out to a caller.
    pub fn is_used(self) -> bool {
        self.0 as u32 & USED_FLAG != 0
    }

    /// True for the distinguished "no record" value.
    pub fn is_invalid(self) -> bool {
        self.0 as u32 == (USED_FLAG | INDEX_MASK)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "record <invalid>")
        } else {
            write!(
                f,
                "record {}/{}{}",
                self.pool(),
                self.index(),
                if self.is_used() { " (used)" } else { "" }
            )
        }
    }
}

/// A free record's position, as tracked by a positioner: the owning pool plus
/// the record index. Plain data, no pointers, copied in and out of positioner
/// cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeRef {
    pub pool: u32,
    pub index: u32,
}

impl FreeRef {
    /// Placeholder for positioner cells that hold no record yet.
    pub(crate) const EMPTY: Self = Self {
        pool: 0,
        index: INVALID_SLOT,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let id = RecordId::new_used(3, 17);
        assert_eq!(id.pool(), 3);
        assert_eq!(id.index(), 17);
        assert!(id.is_used());
        assert!(!id.is_invalid());
    }

    #[test]
    fn test_bits_round_trip() {
        let id = RecordId::new_used(0xDEAD, 0x7FFF_FFFE & INDEX_MASK);
        let restored = RecordId::from_bits(id.to_bits());
        assert_eq!(id, restored);
        assert_eq!(restored.pool(), 0xDEAD);
    }

    #[test]
    fn test_invalid_is_never_a_real_record() {
        let id = RecordId::INVALID;
        assert!(id.is_invalid());
        assert!(id.is_used());
        // The reserved index lies past any permissible capacity.
        assert!(id.index() as usize > MAX_POOL_CAPACITY);
    }

    #[test]
    fn test_used_flag_does_not_leak_into_index() {
        let id = RecordId::new_used(1, 0);
        assert_eq!(id.index(), 0);
        assert!(id.is_used());
    }

    #[test]
    fn test_display() {
        assert_eq!(RecordId::new_used(2, 5).to_string(), "record 2/5 (used)");
        assert_eq!(RecordId::INVALID.to_string(), "record <invalid>");
    }
}
