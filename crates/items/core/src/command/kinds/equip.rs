use tracing::{debug, info};

use super::{available_item, free_slot_lock, item_ref, store_mut, store_ref};
use crate::command::{
    CommandError, CommandOutcome, ReplicatedCommand, TaggedCommand, VersionGuard,
};
use crate::data::ItemData;
use crate::definition::DefinitionId;
use crate::id::{ItemId, StoreId};
use crate::spec::ItemSpec;
use crate::store::{ItemsStores, StoreError};
use crate::tag::GameplayTag;

/// Puts an existing item on a slot, displacing the current occupant.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EquipItem {
    pub store: StoreId,
    pub item: ItemId,
    pub slot: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl EquipItem {
    pub fn new(store: StoreId, item: ItemId, slot: GameplayTag) -> Self {
        Self {
            store,
            item,
            slot,
            guard: VersionGuard::new(),
        }
    }
}

impl TaggedCommand for EquipItem {
    const TAG: &'static str = "equip_item";
}

impl ReplicatedCommand for EquipItem {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let store = store_ref(stores, self.store)?;
        let item = available_item(store, self.item)?;
        if item.is_attached() {
            return Err(CommandError::store_item(
                self.store,
                self.item,
                StoreError::AttachedItemCannotUseSlot {
                    item: self.item,
                    slot: self.slot.clone(),
                },
            ));
        }
        free_slot_lock(store, &self.slot)?;

        if let Some(occupant) = store.item_from_slot(&self.slot).map(ItemData::id) {
            if occupant == self.item {
                return Err(CommandError::AlreadyInSlot {
                    item: self.item,
                    slot: self.slot.clone(),
                });
            }
            if store.is_pending(occupant) {
                return Err(CommandError::ItemPending { item: occupant });
            }
        }
        Ok(())
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        let occupant = stores
            .get(self.store)
            .and_then(|store| store.item_from_slot(&self.slot))
            .map(ItemData::id);

        self.guard.track(stores, self.store, self.item);
        if let Some(occupant) = occupant {
            self.guard.track(stores, self.store, occupant);
        }
        self.guard.lock_slot(stores, self.store, &self.slot);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let store = store_mut(stores, self.store)?;
        let item = item_ref(store, self.item)?;

        if item.is_attached() {
            return Err(CommandError::store_item(
                self.store,
                self.item,
                StoreError::AttachedItemCannotUseSlot {
                    item: self.item,
                    slot: self.slot.clone(),
                },
            ));
        }
        let occupant = store.item_from_slot(&self.slot).map(ItemData::id);
        if occupant == Some(self.item) {
            return Err(CommandError::AlreadyInSlot {
                item: self.item,
                slot: self.slot.clone(),
            });
        }

        if occupant.is_some() {
            store
                .remove_item_from_slot(&self.slot)
                .map_err(|error| CommandError::store(self.store, error))?;
        }
        store
            .add_item_to_slot(self.item, &self.slot)
            .map_err(|error| CommandError::store_item(self.store, self.item, error))?;

        info!(store = %self.store, item = %self.item, slot = %self.slot, "item equipped");
        Ok(CommandOutcome::Item(self.item))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(item = %self.item, success, "equip confirmed");
    }
}

/// Creates a new item straight onto a slot.
///
/// The current occupant is either removed from the store entirely
/// (`remove_existing`) or just taken off the slot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EquipNewItem {
    pub store: StoreId,
    pub definition: DefinitionId,
    pub slot: GameplayTag,
    pub remove_existing: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl EquipNewItem {
    pub fn new(
        store: StoreId,
        definition: impl Into<DefinitionId>,
        slot: GameplayTag,
        remove_existing: bool,
    ) -> Self {
        Self {
            store,
            definition: definition.into(),
            slot,
            remove_existing,
            guard: VersionGuard::new(),
        }
    }
}

impl TaggedCommand for EquipNewItem {
    const TAG: &'static str = "equip_new_item";
}

impl ReplicatedCommand for EquipNewItem {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let store = store_ref(stores, self.store)?;
        if store.definitions().definition(&self.definition).is_none() {
            return Err(CommandError::UnknownDefinition {
                definition: self.definition.clone(),
            });
        }
        free_slot_lock(store, &self.slot)?;
        if let Some(occupant) = store.item_from_slot(&self.slot).map(ItemData::id) {
            if store.is_pending(occupant) {
                return Err(CommandError::ItemPending { item: occupant });
            }
        }
        Ok(())
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        let occupant = stores
            .get(self.store)
            .and_then(|store| store.item_from_slot(&self.slot))
            .map(ItemData::id);

        if let Some(occupant) = occupant {
            self.guard.track(stores, self.store, occupant);
        }
        self.guard.lock_slot(stores, self.store, &self.slot);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let store = store_mut(stores, self.store)?;
        let occupant = store.item_from_slot(&self.slot).map(ItemData::id);

        // Adding first keeps a failed add from losing the occupant.
        let added = store
            .add_new_item(&ItemSpec::new(self.definition.clone(), 1))
            .map_err(|error| CommandError::store(self.store, error))?;

        if let Some(occupant) = occupant {
            let result = if self.remove_existing {
                store.remove_item(occupant, -1, true)
            } else {
                store.remove_item_from_slot(&self.slot).map(|_| ())
            };
            result.map_err(|error| CommandError::store_item(self.store, occupant, error))?;
        }
        store
            .add_item_to_slot(added, &self.slot)
            .map_err(|error| CommandError::store_item(self.store, added, error))?;

        info!(
            store = %self.store,
            item = %added,
            definition = %self.definition,
            slot = %self.slot,
            "new item equipped"
        );
        Ok(CommandOutcome::Item(added))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(definition = %self.definition, success, "equip new confirmed");
    }
}
