use tracing::{debug, info};

use super::{available_item, free_attachment_slot_lock, store_mut, store_ref};
use crate::command::{
    CommandError, CommandOutcome, ReplicatedCommand, TaggedCommand, VersionGuard,
};
use crate::data::ItemData;
use crate::id::{ItemId, StoreId};
use crate::store::{ItemsStores, StoreError};
use crate::tag::GameplayTag;

/// Attaches an existing item to a socket on another item in the same store.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachItem {
    pub store: StoreId,
    pub owner: ItemId,
    pub attachment: ItemId,
    pub attach_slot: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl AttachItem {
    pub fn new(store: StoreId, owner: ItemId, attachment: ItemId, attach_slot: GameplayTag) -> Self {
        Self {
            store,
            owner,
            attachment,
            attach_slot,
            guard: VersionGuard::new(),
        }
    }
}

impl TaggedCommand for AttachItem {
    const TAG: &'static str = "attach_item";
}

impl ReplicatedCommand for AttachItem {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let store = store_ref(stores, self.store)?;
        available_item(store, self.owner)?;
        available_item(store, self.attachment)?;
        free_attachment_slot_lock(store, self.owner, &self.attach_slot)?;
        store
            .check_attach_target(self.owner, &self.attach_slot, Some(self.attachment))
            .map_err(|error| CommandError::store_item(self.store, self.attachment, error))
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        self.guard.track(stores, self.store, self.owner);
        self.guard.track(stores, self.store, self.attachment);
        self.guard
            .lock_attachment_slot(stores, self.store, self.owner, &self.attach_slot);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let store = store_mut(stores, self.store)?;
        store
            .attach_to_item(self.owner, self.attachment, &self.attach_slot)
            .map_err(|error| CommandError::store_item(self.store, self.attachment, error))?;

        info!(
            store = %self.store,
            owner = %self.owner,
            attachment = %self.attachment,
            slot = %self.attach_slot,
            "attach executed"
        );
        Ok(CommandOutcome::Item(self.attachment))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(attachment = %self.attachment, success, "attach confirmed");
    }
}

/// Detaches whatever sits on `owner`'s socket; the item stays in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetachItem {
    pub store: StoreId,
    pub owner: ItemId,
    pub attach_slot: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl DetachItem {
    pub fn new(store: StoreId, owner: ItemId, attach_slot: GameplayTag) -> Self {
        Self {
            store,
            owner,
            attach_slot,
            guard: VersionGuard::new(),
        }
    }
}

impl TaggedCommand for DetachItem {
    const TAG: &'static str = "detach_item";
}

impl ReplicatedCommand for DetachItem {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let store = store_ref(stores, self.store)?;
        available_item(store, self.owner)?;
        free_attachment_slot_lock(store, self.owner, &self.attach_slot)?;
        let attachment = store
            .find_attached_item_on_slot(self.owner, &self.attach_slot)
            .map(ItemData::id)
            .ok_or_else(|| {
                CommandError::store_item(
                    self.store,
                    self.owner,
                    StoreError::NothingAttached {
                        owner: self.owner,
                        slot: self.attach_slot.clone(),
                    },
                )
            })?;
        available_item(store, attachment)?;
        Ok(())
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        let attachment = stores
            .get(self.store)
            .and_then(|store| store.find_attached_item_on_slot(self.owner, &self.attach_slot))
            .map(ItemData::id);

        self.guard.track(stores, self.store, self.owner);
        if let Some(attachment) = attachment {
            self.guard.track(stores, self.store, attachment);
        }
        self.guard
            .lock_attachment_slot(stores, self.store, self.owner, &self.attach_slot);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let store = store_mut(stores, self.store)?;
        let attachment = store
            .detach_item_from_slot(self.owner, &self.attach_slot)
            .map_err(|error| CommandError::store_item(self.store, self.owner, error))?;

        info!(
            store = %self.store,
            owner = %self.owner,
            attachment = %attachment,
            slot = %self.attach_slot,
            "detach executed"
        );
        Ok(CommandOutcome::Item(attachment))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(owner = %self.owner, success, "detach confirmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemSpec;
    use crate::command::kinds::harness::{assert_clear, round_trip};
    use crate::store::test_support::{INVENTORY, authority_stores, client_stores, sync, tag};

    #[test]
    fn attach_then_detach_through_commands() {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let inventory = authority.get_mut(INVENTORY).unwrap();
        let bow = inventory.add_item(&ItemSpec::new("bow", 1)).unwrap();
        let scope = inventory.add_item(&ItemSpec::new("scope", 1)).unwrap();
        sync(&authority, &mut clients);
        let socket = tag("Socket.Scope");

        round_trip(
            &mut AttachItem::new(INVENTORY, bow, scope, socket.clone()),
            &mut authority,
            &mut clients,
        )
        .unwrap();
        assert_eq!(
            clients.get(INVENTORY).unwrap().item(scope).unwrap().owner(),
            Some(bow)
        );

        let outcome = round_trip(
            &mut DetachItem::new(INVENTORY, bow, socket),
            &mut authority,
            &mut clients,
        )
        .unwrap();
        assert_eq!(outcome, CommandOutcome::Item(scope));
        assert!(!clients.get(INVENTORY).unwrap().item(scope).unwrap().is_attached());
        assert_clear(&clients);
    }

    #[test]
    fn attachment_slot_lock_blocks_concurrent_attach() {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let inventory = authority.get_mut(INVENTORY).unwrap();
        let bow = inventory.add_item(&ItemSpec::new("bow", 1)).unwrap();
        let scope = inventory.add_item(&ItemSpec::new("scope", 1)).unwrap();
        let spare = inventory.add_item(&ItemSpec::new("scope", 1)).unwrap();
        sync(&authority, &mut clients);
        let socket = tag("Socket.Scope");

        let mut first = AttachItem::new(INVENTORY, bow, scope, socket.clone());
        first.pre_send_command(&mut clients);

        // The owner is pending, so the second request is refused up front.
        assert_eq!(
            AttachItem::new(INVENTORY, bow, spare, socket.clone()).can_send_command(&clients),
            Err(CommandError::ItemPending { item: bow })
        );
        assert!(
            clients
                .get(INVENTORY)
                .unwrap()
                .is_attachment_slot_locked(bow, &socket)
        );

        first.command_confirmed(&mut clients, false);
        assert_clear(&clients);
    }

    #[test]
    fn cyclic_attach_is_refused_before_sending() {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let inventory = authority.get_mut(INVENTORY).unwrap();
        let first = inventory.add_item(&ItemSpec::new("link", 1)).unwrap();
        let second = inventory
            .add_item_attached(&ItemSpec::new("link", 1), first, &tag("Socket.Link"))
            .unwrap();
        sync(&authority, &mut clients);

        assert!(matches!(
            AttachItem::new(INVENTORY, second, first, tag("Socket.Link"))
                .can_send_command(&clients),
            Err(CommandError::Store {
                source: StoreError::AttachmentCycle { .. },
                ..
            })
        ));
    }
}
