//! When to take a snapshot.

use uuid::Uuid;

pub const DEFAULT_SNAPSHOT_FREQUENCY: u32 = 10;

/// Decides after each save whether the aggregate gets a snapshot
pub trait SnapshotStrategy: Send + Sync {
    fn should_create_snapshot(&self, aggregate_id: Uuid, new_version: i64) -> bool;
}

/// Snapshot every `frequency` versions (and at version 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencySnapshotStrategy {
    frequency: u32,
}

impl FrequencySnapshotStrategy {
    /// A frequency of 0 is treated as 1
    pub fn new(frequency: u32) -> Self {
        Self {
            frequency: frequency.max(1),
        }
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }
}

impl Default for FrequencySnapshotStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_FREQUENCY)
    }
}

impl SnapshotStrategy for FrequencySnapshotStrategy {
    fn should_create_snapshot(&self, _aggregate_id: Uuid, new_version: i64) -> bool {
        new_version % i64::from(self.frequency) == 0
    }
}

/// Never snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSnapshot;

impl SnapshotStrategy for NeverSnapshot {
    fn should_create_snapshot(&self, _aggregate_id: Uuid, _new_version: i64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frequency_is_ten() {
        let strategy = FrequencySnapshotStrategy::default();
        let id = Uuid::new_v4();

        assert_eq!(strategy.frequency(), 10);
        assert!(!strategy.should_create_snapshot(id, 9));
        assert!(strategy.should_create_snapshot(id, 10));
        assert!(!strategy.should_create_snapshot(id, 11));
        assert!(strategy.should_create_snapshot(id, 20));
    }

    #[test]
    fn test_zero_frequency_snapshots_every_version() {
        let strategy = FrequencySnapshotStrategy::new(0);
        let id = Uuid::new_v4();

        assert_eq!(strategy.frequency(), 1);
        assert!(strategy.should_create_snapshot(id, 1));
        assert!(strategy.should_create_snapshot(id, 2));
        assert!(strategy.should_create_snapshot(id, 0));
    }

    #[test]
    fn test_never_snapshot() {
        assert!(!NeverSnapshot.should_create_snapshot(Uuid::new_v4(), 10));
    }
}
