//! Saving authoritative stores and restoring them into a fresh runtime.

mod common;

use std::sync::Arc;

use common::{INVENTORY, STASH, builder, tag};
use items_core::{EquipItem, ItemSpec};
use items_runtime::{FileStoreRepository, RuntimeError, StoreRepository};

#[tokio::test]
async fn saved_stores_are_restored_on_build() {
    let dir = tempfile::tempdir().unwrap();
    let repository = Arc::new(FileStoreRepository::new(dir.path()).unwrap());

    let runtime = builder()
        .repository(repository.clone())
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let sword = handle
        .grant_item(INVENTORY, ItemSpec::new("sword", 1))
        .await
        .unwrap();
    handle
        .grant_item(INVENTORY, ItemSpec::new("potion", 7))
        .await
        .unwrap();
    let rifle = handle
        .grant_item(STASH, ItemSpec::new("rifle", 1))
        .await
        .unwrap();

    let mut session = runtime.connect().await.unwrap();
    let id = session
        .send(EquipItem::new(INVENTORY, sword, tag("Slot.Weapon")))
        .await
        .unwrap();
    assert!(session.wait_for(id).await.unwrap().success);

    assert_eq!(handle.save().await.unwrap(), 2);
    let inventory = handle.snapshot(INVENTORY).await.unwrap();
    let stash = handle.snapshot(STASH).await.unwrap();
    assert_eq!(stash.record_count(), 2);

    drop(handle);
    session.shutdown();
    runtime.shutdown().await.unwrap();

    let mut stores = repository.list_stores().unwrap();
    stores.sort();
    assert_eq!(stores, vec![INVENTORY, STASH]);

    let restored = builder().repository(repository).build().await.unwrap();
    let handle = restored.handle();
    assert_eq!(handle.snapshot(INVENTORY).await.unwrap(), inventory);
    assert_eq!(handle.snapshot(STASH).await.unwrap(), stash);

    let session = restored.connect().await.unwrap();
    let replica = session.store(INVENTORY).unwrap();
    assert_eq!(
        replica.item_from_slot(&tag("Slot.Weapon")).map(|i| i.id()),
        Some(sword)
    );
    assert_eq!(replica.count_items_by_definition(&"potion".into()), 7);
    assert!(
        session
            .store(STASH)
            .unwrap()
            .find_attached_item_on_slot(rifle, &tag("Socket.Scope"))
            .is_some()
    );
}

#[tokio::test]
async fn save_without_repository_is_an_error() {
    let runtime = builder().build().await.unwrap();
    let result = runtime.handle().save().await;
    assert!(matches!(result, Err(RuntimeError::MissingRepository)));
}

#[tokio::test]
async fn corrupted_snapshot_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let repository = Arc::new(FileStoreRepository::new(dir.path()).unwrap());

    let runtime = builder()
        .repository(repository.clone())
        .build()
        .await
        .unwrap();
    runtime
        .handle()
        .grant_item(INVENTORY, ItemSpec::new("shield", 1))
        .await
        .unwrap();
    runtime.handle().save().await.unwrap();
    runtime.shutdown().await.unwrap();

    std::fs::write(dir.path().join("store_1.bin"), b"not a snapshot").unwrap();

    let result = builder().repository(repository).build().await;
    assert!(matches!(result, Err(RuntimeError::Repository(_))));
}
