//! Repository contracts for saving and loading store contents.

use items_core::StoreId;

use super::{Result, StoreSnapshot};

/// Repository for store persistence and loading
///
/// One snapshot per store id; saving replaces the previous snapshot.
pub trait StoreRepository: Send + Sync {
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()>;

    fn load(&self, store: StoreId) -> Result<Option<StoreSnapshot>>;

    fn exists(&self, store: StoreId) -> bool;

    fn delete(&self, store: StoreId) -> Result<()>;

    /// List all stores with a saved snapshot
    fn list_stores(&self) -> Result<Vec<StoreId>> {
        Ok(vec![])
    }
}
