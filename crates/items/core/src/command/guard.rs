//! Optimistic version guard shared by the item commands.
//!
//! On the client, [`VersionGuard`] marks the items a command touches as
//! pending, takes the slot locks it needs and snapshots item versions. The
//! snapshot travels with the command; the authority re-reads the versions
//! and refuses to execute if any of them moved. The locks never leave the
//! client and are released exactly once, whatever the outcome.

use tracing::trace;

use super::CommandError;
use crate::id::{ItemId, StoreId};
use crate::store::ItemsStores;
use crate::tag::GameplayTag;

/// Version an item had when its command was prepared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpectedVersion {
    pub store: StoreId,
    pub item: ItemId,
    pub version: u32,
}

/// Client-side locks a guard holds until release.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct HeldLocks {
    pending: Vec<(StoreId, ItemId)>,
    items: Vec<(StoreId, ItemId)>,
    slots: Vec<(StoreId, GameplayTag)>,
    attachment_slots: Vec<(StoreId, ItemId, GameplayTag)>,
}

impl HeldLocks {
    fn is_empty(&self) -> bool {
        self.pending.is_empty()
            && self.items.is_empty()
            && self.slots.is_empty()
            && self.attachment_slots.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionGuard {
    expected: Vec<ExpectedVersion>,
    #[cfg_attr(feature = "serde", serde(skip))]
    held: HeldLocks,
}

impl VersionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected(&self) -> &[ExpectedVersion] {
        &self.expected
    }

    /// True while the guard still holds client-side locks.
    pub fn is_holding(&self) -> bool {
        !self.held.is_empty()
    }

    /// Marks `item` pending and records its current version.
    ///
    /// Unknown stores or items are skipped; `validate` reports them later.
    pub fn track(&mut self, stores: &mut ItemsStores, store: StoreId, item: ItemId) {
        let Some(target) = stores.get_mut(store) else {
            return;
        };
        let Some(version) = target.item(item).map(|record| record.version()) else {
            return;
        };

        self.expected.push(ExpectedVersion {
            store,
            item,
            version,
        });
        target.add_pending_items(&[item]);
        self.held.pending.push((store, item));
        trace!(%store, %item, version, "tracking item version");
    }

    pub fn lock_item(&mut self, stores: &mut ItemsStores, store: StoreId, item: ItemId) {
        if let Some(target) = stores.get_mut(store) {
            target.lock_item(item);
            self.held.items.push((store, item));
        }
    }

    pub fn lock_slot(&mut self, stores: &mut ItemsStores, store: StoreId, slot: &GameplayTag) {
        if let Some(target) = stores.get_mut(store) {
            target.lock_slot(slot);
            self.held.slots.push((store, slot.clone()));
        }
    }

    pub fn lock_attachment_slot(
        &mut self,
        stores: &mut ItemsStores,
        store: StoreId,
        owner: ItemId,
        slot: &GameplayTag,
    ) {
        if let Some(target) = stores.get_mut(store) {
            target.lock_attachment_slot(owner, slot);
            self.held
                .attachment_slots
                .push((store, owner, slot.clone()));
        }
    }

    /// Fails if any tracked item changed or vanished since `track`.
    pub fn validate(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        for expected in &self.expected {
            let store = stores.get(expected.store).ok_or(CommandError::UnknownStore {
                store: expected.store,
            })?;
            let actual = store.item(expected.item).map(|record| record.version());
            if actual != Some(expected.version) {
                return Err(CommandError::StaleVersion {
                    store: expected.store,
                    item: expected.item,
                    expected: expected.version,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Releases every lock this guard acquired. Safe to call repeatedly.
    pub fn release(&mut self, stores: &mut ItemsStores) {
        let held = std::mem::take(&mut self.held);

        for (store, item) in held.pending {
            if let Some(target) = stores.get_mut(store) {
                target.remove_pending_item(item);
            }
        }
        for (store, item) in held.items {
            if let Some(target) = stores.get_mut(store) {
                target.unlock_item(item);
            }
        }
        for (store, slot) in held.slots {
            if let Some(target) = stores.get_mut(store) {
                target.unlock_slot(&slot);
            }
        }
        for (store, owner, slot) in held.attachment_slots {
            if let Some(target) = stores.get_mut(store) {
                target.unlock_attachment_slot(owner, &slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemSpec;
    use crate::store::test_support::{INVENTORY, authority_stores, client_stores, sync, tag};

    #[test]
    fn track_locks_and_release_clears_once() {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let sword = authority
            .get_mut(INVENTORY)
            .unwrap()
            .add_item(&ItemSpec::new("sword", 1))
            .unwrap();
        sync(&authority, &mut clients);

        let mut guard = VersionGuard::new();
        guard.track(&mut clients, INVENTORY, sword);
        guard.lock_slot(&mut clients, INVENTORY, &tag("Slot.Weapon"));

        let replica = clients.get(INVENTORY).unwrap();
        assert!(replica.is_pending(sword));
        assert!(replica.is_slot_locked(&tag("Slot.Weapon")));
        assert_eq!(guard.expected()[0].version, 1);

        guard.release(&mut clients);
        guard.release(&mut clients);
        assert!(!guard.is_holding());
        assert!(
            clients
                .get(INVENTORY)
                .unwrap()
                .prediction_locks()
                .is_clear()
        );
    }

    #[test]
    fn validate_detects_changed_and_missing_items() {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let inventory = authority.get_mut(INVENTORY).unwrap();
        let sword = inventory.add_item(&ItemSpec::new("sword", 1)).unwrap();
        let potion = inventory.add_item(&ItemSpec::new("potion", 3)).unwrap();
        sync(&authority, &mut clients);

        let mut guard = VersionGuard::new();
        guard.track(&mut clients, INVENTORY, sword);
        guard.track(&mut clients, INVENTORY, potion);
        assert_eq!(guard.validate(&authority), Ok(()));

        let inventory = authority.get_mut(INVENTORY).unwrap();
        inventory.add_item_to_slot(sword, &tag("Slot.Weapon")).unwrap();
        assert_eq!(
            guard.validate(&authority),
            Err(CommandError::StaleVersion {
                store: INVENTORY,
                item: sword,
                expected: 1,
                actual: Some(2),
            })
        );

        let mut guard = VersionGuard::new();
        guard.track(&mut clients, INVENTORY, potion);
        authority
            .get_mut(INVENTORY)
            .unwrap()
            .remove_item(potion, -1, true)
            .unwrap();
        assert!(matches!(
            guard.validate(&authority),
            Err(CommandError::StaleVersion { actual: None, .. })
        ));
    }
}
