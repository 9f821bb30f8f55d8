//! Heap configuration parameters.

use crate::align::is_aligned;
use crate::block::{HEADER_SIZE, MIN_PAYLOAD};
use crate::error::HeapError;

/// What `release` does with a pointer that fails validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Absorb the call: log a warning and leave the heap untouched.
    #[default]
    Ignore,
    /// Panic when debug assertions are enabled; behave like `Ignore`
    /// otherwise.
    DebugAssert,
}

/// Configuration for a [`Heap`](crate::Heap).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Total arena size in bytes, headers included.
    ///
    /// Default: [`HeapConfig::DEFAULT_CAPACITY`]. Must be a multiple of 4
    /// and large enough for one header plus the minimum payload.
    pub capacity: u32,

    /// Zero every payload before it returns to the free pool.
    ///
    /// Costs O(block size) per release. Defaults to on when the crate is
    /// built with the `wipe-on-release` feature.
    pub wipe_on_release: bool,

    /// Handling of invalid or repeated releases.
    pub invalid_release: ReleasePolicy,
}

impl HeapConfig {
    /// Default arena size: 16 KiB.
    pub const DEFAULT_CAPACITY: u32 = 0x4000;

    /// Smallest usable arena: one header plus the minimum payload.
    pub const MIN_CAPACITY: u32 = HEADER_SIZE + MIN_PAYLOAD;

    /// Create a config for an arena of `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            wipe_on_release: cfg!(feature = "wipe-on-release"),
            invalid_release: ReleasePolicy::default(),
        }
    }

    /// Override payload wiping on release.
    pub fn with_wipe_on_release(mut self, wipe: bool) -> Self {
        self.wipe_on_release = wipe;
        self
    }

    /// Override the invalid-release policy.
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.invalid_release = policy;
        self
    }

    /// Check that the capacity can back a heap.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.capacity < Self::MIN_CAPACITY {
            return Err(HeapError::InvalidConfig {
                reason: format!(
                    "capacity {} is below the minimum of {} bytes",
                    self.capacity,
                    Self::MIN_CAPACITY
                ),
            });
        }
        if !is_aligned(self.capacity) {
            return Err(HeapError::InvalidConfig {
                reason: format!("capacity {} is not a multiple of 4", self.capacity),
            });
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_is_16k() {
        let config = HeapConfig::default();
        assert_eq!(config.capacity, 16 * 1024);
        assert_eq!(config.invalid_release, ReleasePolicy::Ignore);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wipe_default_follows_feature() {
        let config = HeapConfig::new(64);
        assert_eq!(config.wipe_on_release, cfg!(feature = "wipe-on-release"));
        assert!(config.with_wipe_on_release(true).wipe_on_release);
    }

    #[test]
    fn tiny_capacity_rejected() {
        let result = HeapConfig::new(HeapConfig::MIN_CAPACITY - 4).validate();
        assert!(matches!(result, Err(HeapError::InvalidConfig { .. })));
        assert!(HeapConfig::new(HeapConfig::MIN_CAPACITY).validate().is_ok());
    }

    #[test]
    fn unaligned_capacity_rejected() {
        let result = HeapConfig::new(1026).validate();
        assert!(matches!(result, Err(HeapError::InvalidConfig { .. })));
    }
}
