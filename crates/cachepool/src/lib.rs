//! cachepool-rs - a pointer-free keyed cache pool.
//!
//! A keyed store whose values live in pre-allocated slabs of fixed-size
//! records. The key index maps to packed 64-bit identifiers instead of
//! references, so a large long-lived cache carries no traceable pointer
//! graph: no per-entry allocation, no fragmentation, nothing for a tracing
//! collector to chase.
//!
//! # Architecture
//!
//! - **Slab**: per-pool contiguous storage, carved into records (header +
//!   payload), allocated once and never moved.
//! - **Positioner**: tracks each pool's free records - either an intrusive
//!   free list under a spin lock ([`PositionerMode::Slots`]) or a bounded
//!   lock-free ring with a packed head|tail word ([`PositionerMode::Ring`]).
//! - **Pool**: one slab plus one positioner; acquire/release by
//!   [`RecordId`].
//! - **[`CachePool`]**: an auto-extending set of pools plus a sharded
//!   key index.
//!
//! # Example
//!
//! ```
//! use cachepool_rs::{CacheKey, CachePool, Config};
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash)]
//! struct SessionKey(u64);
//!
//! impl CacheKey for SessionKey {
//!     fn shard_hash(&self) -> u64 {
//!         self.0
//!     }
//! }
//!
//! #[derive(Clone, Copy, Default)]
//! struct Counters {
//!     hits: u64,
//!     misses: u64,
//! }
//!
//! let cache: CachePool<SessionKey, Counters> =
//!     CachePool::new(Config::new(2, 1024)).unwrap();
//!
//! let value = cache.acquire().unwrap();
//! value.update(|c| c.hits += 1);
//! cache.store(SessionKey(7), &value);
//!
//! assert_eq!(cache.load(&SessionKey(7)).unwrap().read().hits, 1);
//! assert!(cache.remove_and_release(&SessionKey(7)));
//! assert!(!cache.remove_and_release(&SessionKey(7)));
//! ```
//!
//! # Payload contract
//!
//! Payloads are fixed-size, pointer-free values (`Copy + Default`). A record
//! is exclusively owned by whoever holds its identifier: the positioner while
//! free, the external caller while used. Keys are pointer-free comparable
//! data exposing a shard hash; see [`CacheKey`].

mod cache;
mod config;
mod error;
mod ident;
mod pool;
mod ring;
mod shard;
mod slab;
mod slots;
mod sync;

pub use cache::{CachePool, CacheStats, ValueRef};
pub use config::{Config, PositionerMode};
pub use error::Error;
pub use ident::{RecordId, MAX_POOL_CAPACITY};
pub use pool::Pool;
pub use shard::CacheKey;
