//! Persistent form of a store's contents.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use items_core::{ItemCopyContainer, ItemsStore, StoreError, StoreId};

/// Every top-level item of a store with its attachment tree.
///
/// Ids, stacks, levels, tags, slots and attachments survive a round trip;
/// record versions and replication keys start over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub store: StoreId,
    pub items: Vec<ItemCopyContainer>,
}

impl StoreSnapshot {
    /// Capture `store`, ordering roots by id so equal contents encode equally.
    pub fn capture(store: &ItemsStore) -> Self {
        let mut roots: Vec<_> = store
            .items()
            .filter(|item| !item.is_attached())
            .map(|item| item.id())
            .collect();
        roots.sort_unstable();

        let items = roots
            .into_iter()
            .filter_map(|id| store.copy_container(id))
            .collect();

        Self {
            store: store.id(),
            items,
        }
    }

    /// Number of records, attachments included.
    pub fn record_count(&self) -> usize {
        self.items.iter().map(|item| item.specs().len()).sum()
    }

    /// Recreate every item in `store` (which must hold authority).
    ///
    /// Stops at the first container the store refuses; earlier containers
    /// stay restored.
    pub fn restore_into(&self, store: &mut ItemsStore) -> Result<usize, StoreError> {
        let mut restored = 0;
        for container in &self.items {
            restored += store.add_copy_container(container)?.len();
        }
        Ok(restored)
    }

    /// SHA-256 over the encoded snapshot, hex encoded.
    pub fn checksum(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}
