//! File-based StoreRepository implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use items_core::StoreId;

use crate::repository::{RepositoryError, Result, StoreRepository, StoreSnapshot};

const INDEX_FILE: &str = "index.json";

/// Index entry describing one saved snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexEntry {
    file: String,
    records: usize,
    checksum: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreIndex {
    stores: BTreeMap<u32, IndexEntry>,
}

/// File-based implementation of StoreRepository.
///
/// Stores snapshots as individual bincode files indexed by store id.
///
/// # File Format
///
/// - `store_{id}.bin`: bincode-encoded [`StoreSnapshot`]
/// - `index.json`: store id → file name, record count and SHA-256 checksum
///
/// Both are written to a temp file first and renamed into place, and the
/// snapshot is committed before the index.
pub struct FileStoreRepository {
    base_dir: PathBuf,
    index_lock: Mutex<()>,
}

impl FileStoreRepository {
    /// Create a new file-based store repository.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;
        Ok(Self {
            base_dir,
            index_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_name(store: StoreId) -> String {
        format!("store_{}.bin", store.0)
    }

    fn snapshot_path(&self, store: StoreId) -> PathBuf {
        self.base_dir.join(Self::file_name(store))
    }

    fn index_path(&self) -> PathBuf {
        self.base_dir.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<StoreIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(StoreIndex::default());
        }

        let json = fs::read_to_string(&path).map_err(RepositoryError::Io)?;
        serde_json::from_str(&json).map_err(|e| RepositoryError::Json(e.to_string()))
    }

    fn write_index(&self, index: &StoreIndex) -> Result<()> {
        let path = self.index_path();
        let temp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(index)
            .map_err(|e| RepositoryError::Json(e.to_string()))?;
        fs::write(&temp_path, json).map_err(RepositoryError::Io)?;
        fs::rename(&temp_path, &path).map_err(RepositoryError::Io)?;
        Ok(())
    }

    fn update_index(&self, update: impl FnOnce(&mut StoreIndex)) -> Result<()> {
        let _guard = self
            .index_lock
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut index = self.read_index()?;
        update(&mut index);
        self.write_index(&index)
    }
}

impl StoreRepository for FileStoreRepository {
    fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let path = self.snapshot_path(snapshot.store);
        let temp_path = path.with_extension("bin.tmp");

        // Serialize to bincode
        let bytes = bincode::serialize(snapshot)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let entry = IndexEntry {
            file: Self::file_name(snapshot.store),
            records: snapshot.record_count(),
            checksum: StoreSnapshot::checksum(&bytes),
        };

        // Write to temp file
        fs::write(&temp_path, bytes).map_err(RepositoryError::Io)?;

        // Atomic rename
        fs::rename(&temp_path, &path).map_err(RepositoryError::Io)?;

        self.update_index(|index| {
            index.stores.insert(snapshot.store.0, entry);
        })?;

        tracing::debug!("Saved store[{}] to {}", snapshot.store, path.display());

        Ok(())
    }

    fn load(&self, store: StoreId) -> Result<Option<StoreSnapshot>> {
        let path = self.snapshot_path(store);

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(RepositoryError::Io)?;

        if let Some(entry) = self.read_index()?.stores.get(&store.0) {
            let checksum = StoreSnapshot::checksum(&bytes);
            if checksum != entry.checksum {
                return Err(RepositoryError::CorruptedData(format!(
                    "store {store} checksum {checksum} does not match index {}",
                    entry.checksum
                )));
            }
        }

        let snapshot: StoreSnapshot = bincode::deserialize(&bytes)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        if snapshot.store != store {
            return Err(RepositoryError::CorruptedData(format!(
                "{} holds store {}",
                path.display(),
                snapshot.store
            )));
        }

        tracing::debug!("Loaded store[{}] from {}", store, path.display());

        Ok(Some(snapshot))
    }

    fn exists(&self, store: StoreId) -> bool {
        self.snapshot_path(store).exists()
    }

    fn delete(&self, store: StoreId) -> Result<()> {
        let path = self.snapshot_path(store);

        if path.exists() {
            fs::remove_file(&path).map_err(RepositoryError::Io)?;
            tracing::debug!("Deleted store[{}]", store);
        }

        self.update_index(|index| {
            index.stores.remove(&store.0);
        })
    }

    fn list_stores(&self) -> Result<Vec<StoreId>> {
        let mut stores = Vec::new();

        let entries = fs::read_dir(&self.base_dir).map_err(RepositoryError::Io)?;

        for entry in entries {
            let entry = entry.map_err(RepositoryError::Io)?;
            let path = entry.path();

            if let Some(filename) = path.file_name().and_then(|s| s.to_str())
                && let Some(id_str) = filename
                    .strip_prefix("store_")
                    .and_then(|s| s.strip_suffix(".bin"))
                && let Ok(id) = id_str.parse::<u32>()
            {
                stores.push(StoreId(id));
            }
        }

        stores.sort_unstable();
        Ok(stores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use items_core::{ItemCopyContainer, ItemSpec};

    fn snapshot(store: u32, amount: u16) -> StoreSnapshot {
        StoreSnapshot {
            store: StoreId(store),
            items: vec![ItemCopyContainer {
                spec: ItemSpec::new("potion", amount),
                slot: None,
                attachments: Vec::new(),
            }],
        }
    }

    #[test]
    fn save_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileStoreRepository::new(dir.path()).unwrap();

        repo.save(&snapshot(2, 3)).unwrap();
        repo.save(&snapshot(1, 4)).unwrap();

        assert_eq!(repo.load(StoreId(1)).unwrap(), Some(snapshot(1, 4)));
        assert_eq!(repo.list_stores().unwrap(), vec![StoreId(1), StoreId(2)]);
        assert!(repo.load(StoreId(9)).unwrap().is_none());
        assert!(!dir.path().join("store_1.bin.tmp").exists());

        let index: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap())
                .unwrap();
        assert_eq!(index["stores"]["2"]["records"], 1);
    }

    #[test]
    fn saving_again_replaces_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileStoreRepository::new(dir.path()).unwrap();

        repo.save(&snapshot(1, 1)).unwrap();
        repo.save(&snapshot(1, 7)).unwrap();

        assert_eq!(repo.load(StoreId(1)).unwrap(), Some(snapshot(1, 7)));
    }

    #[test]
    fn tampered_snapshot_is_reported_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileStoreRepository::new(dir.path()).unwrap();
        repo.save(&snapshot(1, 5)).unwrap();

        let path = dir.path().join("store_1.bin");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            repo.load(StoreId(1)),
            Err(RepositoryError::CorruptedData(_))
        ));
    }

    #[test]
    fn delete_removes_file_and_index_entry() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileStoreRepository::new(dir.path()).unwrap();
        repo.save(&snapshot(3, 2)).unwrap();

        repo.delete(StoreId(3)).unwrap();

        assert!(!repo.exists(StoreId(3)));
        assert!(repo.list_stores().unwrap().is_empty());
        assert!(repo.read_index().unwrap().stores.is_empty());
    }
}
