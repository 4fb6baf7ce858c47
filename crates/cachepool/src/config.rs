use crate::error::Error;
use crate::ident::MAX_POOL_CAPACITY;

/// Which free-record positioner a pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionerMode {
    /// Intrusive free-list stack guarded by a spin lock.
    Slots,
    /// Bounded lock-free ring with a packed head|tail word. Requires a
    /// power-of-two pool capacity.
    Ring,
}

/// Configuration for a [`CachePool`](crate::CachePool).
///
/// Starts from the two required knobs and layers the rest on with builder
/// setters:
///
/// ```
/// use cachepool_rs::{Config, PositionerMode};
///
/// let config = Config::new(4, 1024)
///     .auto_extend(true)
///     .max_pools(64)
///     .mode(PositionerMode::Ring);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Number of pools created up front. Must be positive.
    pub pool_count: usize,
    /// Records per pool. Must be positive; power of two in ring mode.
    pub pool_capacity: usize,
    /// Whether acquiring may append pools once every existing pool is
    /// exhausted. Default: true.
    pub auto_extend: bool,
    /// Upper bound on the pool count when auto-extending. 0 = unbounded.
    pub max_pools: usize,
    /// Requested shard count for the key index, rounded up to the next power
    /// of two. 0 = default to `pool_count`.
    pub shard_count: usize,
    /// Free-record positioner variant. Default: [`PositionerMode::Slots`].
    pub mode: PositionerMode,
}

impl Config {
    /// Creates a configuration with the given pool count and per-pool record
    /// capacity and defaults for everything else.
    pub fn new(pool_count: usize, pool_capacity: usize) -> Self {
        Self {
            pool_count,
            pool_capacity,
            auto_extend: true,
            max_pools: 0,
            shard_count: 0,
            mode: PositionerMode::Slots,
        }
    }

    /// Sets whether the pool set may grow on demand.
    pub fn auto_extend(mut self, enabled: bool) -> Self {
        self.auto_extend = enabled;
        self
    }

    /// Caps the pool count when auto-extending. 0 = unbounded.
    pub fn max_pools(mut self, n: usize) -> Self {
        self.max_pools = n;
        self
    }

    /// Requests a shard count for the key index (rounded up to a power of
    /// two). 0 = default to the initial pool count.
    pub fn shard_count(mut self, n: usize) -> Self {
        self.shard_count = n;
        self
    }

    /// Selects the free-record positioner variant.
    pub fn mode(mut self, mode: PositionerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shard count actually used for the key index, before power-of-two
    /// rounding.
    pub(crate) fn effective_shards(&self) -> usize {
        if self.shard_count == 0 {
            self.pool_count
        } else {
            self.shard_count
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.pool_count == 0 {
            return Err(Error::InvalidConfig {
                reason: "initial pool count must be positive",
            });
        }
        if self.pool_count > u32::MAX as usize {
            return Err(Error::InvalidConfig {
                reason: "initial pool count exceeds the identifier's pool range",
            });
        }
        validate_capacity(self.pool_capacity, self.mode)
    }
}

/// Capacity checks shared between `Config` validation and direct
/// [`Pool`](crate::Pool) construction.
pub(crate) fn validate_capacity(capacity: usize, mode: PositionerMode) -> Result<(), Error> {
    if capacity == 0 {
        return Err(Error::InvalidConfig {
            reason: "pool capacity must be positive",
        });
    }
    if capacity > MAX_POOL_CAPACITY {
        return Err(Error::InvalidConfig {
            reason: "pool capacity exceeds the identifier's 31-bit index range",
        });
    }
    if mode == PositionerMode::Ring && !capacity.is_power_of_two() {
        return Err(Error::InvalidConfig {
            reason: "ring mode requires a power-of-two pool capacity",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(2, 8);
        assert!(config.auto_extend);
        assert_eq!(config.max_pools, 0);
        assert_eq!(config.mode, PositionerMode::Slots);
        assert_eq!(config.effective_shards(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shard_count_override() {
        let config = Config::new(2, 8).shard_count(5);
        assert_eq!(config.effective_shards(), 5);
    }

    #[test]
    fn test_zero_pool_count_rejected() {
        assert!(matches!(
            Config::new(0, 8).validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Config::new(1, 0).validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_ring_requires_power_of_two() {
        let config = Config::new(1, 6).mode(PositionerMode::Ring);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
        let config = Config::new(1, 8).mode(PositionerMode::Ring);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_slot_mode_allows_odd_capacity() {
        assert!(Config::new(1, 6).validate().is_ok());
    }

    #[test]
    fn test_capacity_cap() {
        assert!(Config::new(1, MAX_POOL_CAPACITY + 1).validate().is_err());
    }
}
