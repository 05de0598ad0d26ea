//! Built-in command kinds.

mod attach;
mod drop;
mod equip;
mod transfer;

pub use attach::{AttachItem, DetachItem};
pub use drop::DropItem;
pub use equip::{EquipItem, EquipNewItem};
pub use transfer::{MoveItemBetweenStores, MoveItemToSlot, RemoveItemFromSlot};

use super::CommandError;
use crate::data::ItemData;
use crate::id::{ItemId, StoreId};
use crate::store::{ItemsStore, ItemsStores};
use crate::tag::GameplayTag;

fn store_ref(stores: &ItemsStores, store: StoreId) -> Result<&ItemsStore, CommandError> {
    stores
        .get(store)
        .ok_or(CommandError::UnknownStore { store })
}

fn store_mut(stores: &mut ItemsStores, store: StoreId) -> Result<&mut ItemsStore, CommandError> {
    stores
        .get_mut(store)
        .ok_or(CommandError::UnknownStore { store })
}

fn item_ref(store: &ItemsStore, item: ItemId) -> Result<&ItemData, CommandError> {
    store.item(item).ok_or(CommandError::ItemNotFound {
        store: store.id(),
        item,
    })
}

/// Item exists, is neither pending nor locked.
fn available_item(store: &ItemsStore, item: ItemId) -> Result<&ItemData, CommandError> {
    let record = item_ref(store, item)?;
    if store.is_pending(item) {
        return Err(CommandError::ItemPending { item });
    }
    if store.is_item_locked(item) {
        return Err(CommandError::ItemLocked { item });
    }
    Ok(record)
}

fn free_slot_lock(store: &ItemsStore, slot: &GameplayTag) -> Result<(), CommandError> {
    if store.is_slot_locked(slot) {
        return Err(CommandError::SlotLocked { slot: slot.clone() });
    }
    Ok(())
}

fn free_attachment_slot_lock(
    store: &ItemsStore,
    owner: ItemId,
    slot: &GameplayTag,
) -> Result<(), CommandError> {
    if store.is_attachment_slot_locked(owner, slot) {
        return Err(CommandError::AttachmentSlotLocked {
            owner,
            slot: slot.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod harness {
    //! Drives a command through the client/authority lifecycle in memory.

    use crate::command::{CommandError, CommandOutcome, ReplicatedCommand};
    use crate::store::ItemsStores;
    use crate::store::test_support::sync;

    /// Sends `command` from `clients`, executes it on `authority`, replicates
    /// and confirms. Returns the authority's verdict.
    pub(crate) fn round_trip(
        command: &mut dyn ReplicatedCommand,
        authority: &mut ItemsStores,
        clients: &mut ItemsStores,
    ) -> Result<CommandOutcome, CommandError> {
        command.can_send_command(clients)?;
        command.pre_send_command(clients);

        let result = command.execute(authority);
        sync(authority, clients);
        command.command_confirmed(clients, result.is_ok());
        result
    }

    pub(crate) fn assert_clear(stores: &ItemsStores) {
        for store in stores.iter() {
            assert!(
                store.prediction_locks().is_clear(),
                "{} still holds {:?}",
                store.id(),
                store.prediction_locks()
            );
        }
    }
}
