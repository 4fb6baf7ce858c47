use crate::RecordId;
use thiserror::Error;

/// Error types for cache pool operations.
///
/// Per-pool exhaustion is not represented here: it is always recovered inside
/// [`CachePool::acquire`](crate::CachePool::acquire) by probing the next pool.
/// Used-flag protocol violations are not represented either - they mean a
/// positioner leaked or duplicated a free entry, and panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Construction-time configuration error.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration.
        reason: &'static str,
    },
    /// Every pool is out of free records and the pool set cannot extend.
    #[error("all {pools} pools exhausted and the pool set cannot extend")]
    Exhausted {
        /// Number of pools probed before giving up.
        pools: usize,
    },
    /// A release targeted a pool whose index does not match the identifier.
    #[error("{id} does not belong to pool {pool}")]
    WrongPool {
        /// The identifier being released.
        id: RecordId,
        /// The pool the release was addressed to.
        pool: u32,
    },
    /// A decoded identifier references a nonexistent pool or an out-of-range
    /// record index.
    #[error("corrupt identifier: {id}")]
    CorruptId {
        /// The offending identifier.
        id: RecordId,
    },
}
