//! In-memory StoreRepository implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;

use items_core::StoreId;

use crate::repository::{RepositoryError, Result, StoreRepository, StoreSnapshot};

/// In-memory implementation of StoreRepository.
#[derive(Debug, Default)]
pub struct InMemoryStoreRepository {
    snapshots: RwLock<HashMap<StoreId, StoreSnapshot>>,
}

impl InMemoryStoreRepository {
    /// Create a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with snapshots already saved.
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = StoreSnapshot>) -> Self {
        let snapshots = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.store, snapshot))
            .collect();
        Self {
            snapshots: RwLock::new(snapshots),
        }
    }
}

impl StoreRepository for InMemoryStoreRepository {
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        snapshots.insert(snapshot.store, snapshot.clone());
        Ok(())
    }

    fn load(&self, store: StoreId) -> Result<Option<StoreSnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(snapshots.get(&store).cloned())
    }

    fn exists(&self, store: StoreId) -> bool {
        self.snapshots
            .read()
            .map(|snapshots| snapshots.contains_key(&store))
            .unwrap_or(false)
    }

    fn delete(&self, store: StoreId) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        snapshots.remove(&store);
        Ok(())
    }

    fn list_stores(&self) -> Result<Vec<StoreId>> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut stores: Vec<StoreId> = snapshots.keys().copied().collect();
        stores.sort_unstable();
        Ok(stores)
    }
}
