/// Store configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreConfig {
    /// Removal tombstones older than this many replication keys are dropped
    /// by [`crate::ItemsArray::compact_tombstones`] when no cursor is given.
    pub tombstone_retention: u64,
}

impl StoreConfig {
    // ===== hard limits =====
    /// Deepest attachment chain (owner → attachment → attachment …) a store accepts.
    pub const MAX_ATTACHMENT_DEPTH: usize = 8;
    /// Largest stack any single record can hold.
    pub const MAX_STACKS: u16 = u16::MAX;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_TOMBSTONE_RETENTION: u64 = 1024;

    pub fn new() -> Self {
        Self {
            tombstone_retention: Self::DEFAULT_TOMBSTONE_RETENTION,
        }
    }

    pub fn with_tombstone_retention(tombstone_retention: u64) -> Self {
        Self {
            tombstone_retention,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
