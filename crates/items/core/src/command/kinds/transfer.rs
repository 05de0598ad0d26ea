//! Commands that move items between stores and slots.

use tracing::{debug, info};

use super::{available_item, free_slot_lock, item_ref, store_mut, store_ref};
use crate::command::{
    CommandError, CommandOutcome, ReplicatedCommand, TaggedCommand, VersionGuard,
};
use crate::data::ItemData;
use crate::id::{ItemId, StoreId};
use crate::spec::ItemSpec;
use crate::store::{ItemsStore, ItemsStores, StoreError};
use crate::tag::GameplayTag;

fn pair(
    stores: &mut ItemsStores,
    a: StoreId,
    b: StoreId,
) -> Result<(&mut ItemsStore, &mut ItemsStore), CommandError> {
    if a == b {
        return Err(CommandError::SameStore { store: a });
    }
    if !stores.contains(a) {
        return Err(CommandError::UnknownStore { store: a });
    }
    stores
        .pair_mut(a, b)
        .ok_or(CommandError::UnknownStore { store: b })
}

fn ensure_slot_free(store: &ItemsStore, slot: &GameplayTag) -> Result<(), CommandError> {
    match store.item_from_slot(slot) {
        Some(occupant) => Err(CommandError::store(
            store.id(),
            StoreError::SlotOccupied {
                slot: slot.clone(),
                occupant: occupant.id(),
            },
        )),
        None => Ok(()),
    }
}

/// Moves an item, or part of a stack, from one store to another.
///
/// `stacks == 0` or at least the current count moves the whole record, keeping
/// its id. A partial move leaves the source record in place with fewer stacks
/// and adds the moved stacks to the target as a new or merged record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveItemBetweenStores {
    pub from: StoreId,
    pub to: StoreId,
    pub item: ItemId,
    pub stacks: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl MoveItemBetweenStores {
    pub fn new(from: StoreId, to: StoreId, item: ItemId, stacks: u16) -> Self {
        Self {
            from,
            to,
            item,
            stacks,
            guard: VersionGuard::new(),
        }
    }

    pub fn whole(from: StoreId, to: StoreId, item: ItemId) -> Self {
        Self::new(from, to, item, 0)
    }
}

impl TaggedCommand for MoveItemBetweenStores {
    const TAG: &'static str = "move_item_between_stores";
}

impl ReplicatedCommand for MoveItemBetweenStores {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        if self.from == self.to {
            return Err(CommandError::SameStore { store: self.from });
        }
        store_ref(stores, self.to)?;
        let source = store_ref(stores, self.from)?;
        available_item(source, self.item)?;
        Ok(())
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        self.guard.track(stores, self.from, self.item);
        self.guard.lock_item(stores, self.from, self.item);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let (source, target) = pair(stores, self.from, self.to)?;

        let item = item_ref(source, self.item)?;
        let current = item.stacks();
        let partial = self.stacks > 0 && self.stacks < current;

        let moved = if partial {
            let spec = ItemSpec::from_item(item)
                .with_item_id(ItemId::INVALID)
                .with_amount(self.stacks);
            let added = target
                .add_item(&spec)
                .map_err(|error| CommandError::store(self.to, error))?;
            source
                .remove_item(self.item, i32::from(self.stacks), false)
                .map_err(|error| CommandError::store_item(self.from, self.item, error))?;
            added
        } else {
            target
                .move_item_from(self.item, source)
                .map_err(|error| CommandError::store_item(self.to, self.item, error))?
        };

        info!(
            from = %self.from,
            to = %self.to,
            item = %self.item,
            moved = %moved,
            partial,
            "item moved between stores"
        );
        Ok(CommandOutcome::Item(moved))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(item = %self.item, success, "store move confirmed");
    }
}

/// Puts an item on a slot, moving it into the slot's store first if needed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveItemToSlot {
    pub from: StoreId,
    pub to: StoreId,
    pub item: ItemId,
    pub slot: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl MoveItemToSlot {
    pub fn new(from: StoreId, to: StoreId, item: ItemId, slot: GameplayTag) -> Self {
        Self {
            from,
            to,
            item,
            slot,
            guard: VersionGuard::new(),
        }
    }
}

impl TaggedCommand for MoveItemToSlot {
    const TAG: &'static str = "move_item_to_slot";
}

impl ReplicatedCommand for MoveItemToSlot {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let source = store_ref(stores, self.from)?;
        available_item(source, self.item)?;
        let target = store_ref(stores, self.to)?;
        free_slot_lock(target, &self.slot)?;
        ensure_slot_free(target, &self.slot)
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        self.guard.track(stores, self.from, self.item);
        self.guard.lock_slot(stores, self.to, &self.slot);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;

        if self.from == self.to {
            let store = store_mut(stores, self.from)?;
            store
                .add_item_to_slot(self.item, &self.slot)
                .map_err(|error| CommandError::store_item(self.from, self.item, error))?;
        } else {
            let (target, source) = pair(stores, self.to, self.from)?;
            item_ref(source, self.item)?;
            ensure_slot_free(target, &self.slot)?;

            target
                .move_item_from(self.item, source)
                .map_err(|error| CommandError::store_item(self.to, self.item, error))?;
            target
                .add_item_to_slot(self.item, &self.slot)
                .map_err(|error| CommandError::store_item(self.to, self.item, error))?;
        }

        info!(
            from = %self.from,
            to = %self.to,
            item = %self.item,
            slot = %self.slot,
            "item moved to slot"
        );
        Ok(CommandOutcome::Item(self.item))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(item = %self.item, success, "slot move confirmed");
    }
}

/// Clears a slot; the item returns to `return_to` when that is another store.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RemoveItemFromSlot {
    pub store: StoreId,
    pub return_to: StoreId,
    pub slot: GameplayTag,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl RemoveItemFromSlot {
    pub fn new(store: StoreId, return_to: StoreId, slot: GameplayTag) -> Self {
        Self {
            store,
            return_to,
            slot,
            guard: VersionGuard::new(),
        }
    }

    fn occupant(&self, store: &ItemsStore) -> Result<ItemId, CommandError> {
        store
            .item_from_slot(&self.slot)
            .map(ItemData::id)
            .ok_or_else(|| {
                CommandError::store(
                    self.store,
                    StoreError::SlotEmpty {
                        slot: self.slot.clone(),
                    },
                )
            })
    }
}

impl TaggedCommand for RemoveItemFromSlot {
    const TAG: &'static str = "remove_item_from_slot";
}

impl ReplicatedCommand for RemoveItemFromSlot {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        store_ref(stores, self.return_to)?;
        let store = store_ref(stores, self.store)?;
        free_slot_lock(store, &self.slot)?;
        let occupant = self.occupant(store)?;
        available_item(store, occupant)?;
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

        let item = if self.return_to == self.store {
            let store = store_mut(stores, self.store)?;
            store
                .remove_item_from_slot(&self.slot)
                .map_err(|error| CommandError::store(self.store, error))?
        } else {
            let (target, source) = pair(stores, self.return_to, self.store)?;
            let item = self.occupant(source)?;
            // Moving clears the root's slot on the way out.
            target
                .move_item_from(item, source)
                .map_err(|error| CommandError::store_item(self.return_to, item, error))?
        };

        info!(
            store = %self.store,
            return_to = %self.return_to,
            item = %item,
            slot = %self.slot,
            "item removed from slot"
        );
        Ok(CommandOutcome::Item(item))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(slot = %self.slot, success, "unslot confirmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::kinds::harness::{assert_clear, round_trip};
    use crate::store::test_support::{
        INVENTORY, STASH, authority_stores, client_stores, sync, tag,
    };

    fn stocked(spec: ItemSpec) -> (ItemsStores, ItemsStores, ItemId) {
        let mut authority = authority_stores();
        let mut clients = client_stores();
        let id = authority.get_mut(INVENTORY).unwrap().add_item(&spec).unwrap();
        sync(&authority, &mut clients);
        (authority, clients, id)
    }

    #[test]
    fn partial_move_splits_stack_across_stores() {
        let (mut authority, mut clients, arrows) = stocked(ItemSpec::new("arrow", 5));

        let CommandOutcome::Item(moved) = round_trip(
            &mut MoveItemBetweenStores::new(INVENTORY, STASH, arrows, 2),
            &mut authority,
            &mut clients,
        )
        .unwrap() else {
            panic!("expected item outcome");
        };

        assert_ne!(moved, arrows);
        assert_eq!(clients.get(INVENTORY).unwrap().item(arrows).unwrap().stacks(), 3);
        assert_eq!(clients.get(STASH).unwrap().item(moved).unwrap().stacks(), 2);
        assert_clear(&clients);
    }

    #[test]
    fn full_move_keeps_id() {
        let (mut authority, mut clients, arrows) = stocked(ItemSpec::new("arrow", 5));

        let outcome = round_trip(
            &mut MoveItemBetweenStores::whole(INVENTORY, STASH, arrows),
            &mut authority,
            &mut clients,
        )
        .unwrap();

        assert_eq!(outcome, CommandOutcome::Item(arrows));
        assert!(clients.get(INVENTORY).unwrap().item(arrows).is_none());
        assert_eq!(clients.get(STASH).unwrap().item(arrows).unwrap().stacks(), 5);
        for store in authority.iter() {
            let replica = clients.get(store.id()).unwrap();
            assert_eq!(replica.items_array().digest(), store.items_array().digest());
        }
    }

    #[test]
    fn move_within_one_store_is_refused() {
        let (_, clients, arrows) = stocked(ItemSpec::new("arrow", 5));
        assert_eq!(
            MoveItemBetweenStores::whole(INVENTORY, INVENTORY, arrows).can_send_command(&clients),
            Err(CommandError::SameStore { store: INVENTORY })
        );
    }

    #[test]
    fn move_to_slot_across_stores() {
        let (mut authority, mut clients, sword) = stocked(ItemSpec::new("sword", 1));
        let weapon = tag("Slot.Weapon");

        round_trip(
            &mut MoveItemToSlot::new(INVENTORY, STASH, sword, weapon.clone()),
            &mut authority,
            &mut clients,
        )
        .unwrap();

        let stash = clients.get(STASH).unwrap();
        assert_eq!(stash.item_from_slot(&weapon).map(ItemData::id), Some(sword));
        assert!(clients.get(INVENTORY).unwrap().item(sword).is_none());
        assert_clear(&clients);
    }

    #[test]
    fn move_to_slot_within_store_and_occupied_target() {
        let (mut authority, mut clients, sword) = stocked(ItemSpec::new("sword", 1));
        let weapon = tag("Slot.Weapon");
        round_trip(
            &mut MoveItemToSlot::new(INVENTORY, INVENTORY, sword, weapon.clone()),
            &mut authority,
            &mut clients,
        )
        .unwrap();
        assert!(clients.get(INVENTORY).unwrap().is_on_any_slot(sword));

        let bow = authority
            .get_mut(INVENTORY)
            .unwrap()
            .add_item(&ItemSpec::new("bow", 1))
            .unwrap();
        sync(&authority, &mut clients);
        assert!(matches!(
            MoveItemToSlot::new(INVENTORY, INVENTORY, bow, weapon).can_send_command(&clients),
            Err(CommandError::Store {
                source: StoreError::SlotOccupied { .. },
                ..
            })
        ));
    }

    #[test]
    fn remove_from_slot_returns_item_to_other_store() {
        let (mut authority, mut clients, sword) = stocked(ItemSpec::new("sword", 1));
        let weapon = tag("Slot.Weapon");
        authority
            .get_mut(INVENTORY)
            .unwrap()
            .add_item_to_slot(sword, &weapon)
            .unwrap();
        sync(&authority, &mut clients);

        round_trip(
            &mut RemoveItemFromSlot::new(INVENTORY, INVENTORY, weapon.clone()),
            &mut authority,
            &mut clients,
        )
        .unwrap();
        assert!(clients.get(INVENTORY).unwrap().item(sword).is_some());
        assert!(!clients.get(INVENTORY).unwrap().is_on_any_slot(sword));

        authority
            .get_mut(INVENTORY)
            .unwrap()
            .add_item_to_slot(sword, &weapon)
            .unwrap();
        sync(&authority, &mut clients);
        let outcome = round_trip(
            &mut RemoveItemFromSlot::new(INVENTORY, STASH, weapon.clone()),
            &mut authority,
            &mut clients,
        )
        .unwrap();

        assert_eq!(outcome, CommandOutcome::Item(sword));
        assert!(clients.get(INVENTORY).unwrap().item(sword).is_none());
        assert!(!clients.get(STASH).unwrap().is_on_any_slot(sword));
        assert_clear(&clients);
    }

    #[test]
    fn remove_from_empty_slot_is_refused() {
        let (_, clients, _) = stocked(ItemSpec::new("sword", 1));
        assert!(matches!(
            RemoveItemFromSlot::new(INVENTORY, INVENTORY, tag("Slot.Weapon"))
                .can_send_command(&clients),
            Err(CommandError::Store {
                source: StoreError::SlotEmpty { .. },
                ..
            })
        ));
    }
}
