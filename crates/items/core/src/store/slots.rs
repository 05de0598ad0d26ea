//! Standalone slot mapping.
//!
//! A slot holds at most one item and an item sits on at most one slot. The
//! mapping lives on the record itself (`ItemData::slot`), so it replicates
//! with the record and needs no side table.

use tracing::{debug, warn};

use super::{ItemsStore, StoreError, StoreEvent};
use crate::data::ItemData;
use crate::id::ItemId;
use crate::tag::GameplayTag;

impl ItemsStore {
    pub fn item_from_slot(&self, slot: &GameplayTag) -> Option<&ItemData> {
        self.items.item_from_slot(slot)
    }

    pub fn slot_of(&self, item: ItemId) -> Option<&GameplayTag> {
        self.items.get(item)?.slot()
    }

    pub fn is_on_any_slot(&self, item: ItemId) -> bool {
        self.slot_of(item).is_some()
    }

    pub fn items_on_slots(&self) -> Vec<&ItemData> {
        self.items.items_on_slots()
    }

    /// Puts an item on a free slot.
    ///
    /// An item already on another slot moves. Re-slotting an item onto the
    /// slot it already holds is a no-op.
    pub fn add_item_to_slot(&mut self, id: ItemId, slot: &GameplayTag) -> Result<(), StoreError> {
        self.ensure_authority()?;
        let item = self.require_item(id)?;

        if item.is_attached() {
            warn!(
                store = %self.id,
                item = %id,
                slot = %slot,
                "attached item cannot use a standalone slot"
            );
            return Err(StoreError::AttachedItemCannotUseSlot {
                item: id,
                slot: slot.clone(),
            });
        }

        let previous = item.slot().cloned();
        if previous.as_ref() == Some(slot) {
            return Ok(());
        }
        if let Some(occupant) = self.items.item_from_slot(slot) {
            return Err(StoreError::SlotOccupied {
                slot: slot.clone(),
                occupant: occupant.id(),
            });
        }

        self.items
            .modify(id, |item| item.set_slot(Some(slot.clone())));
        self.events.push(match previous {
            Some(from) => StoreEvent::SlotChanged {
                item: id,
                from,
                to: slot.clone(),
            },
            None => StoreEvent::AddedToSlot {
                item: id,
                slot: slot.clone(),
            },
        });
        debug!(store = %self.id, item = %id, slot = %slot, "item slotted");
        Ok(())
    }

    /// Clears a slot; returns the item that was on it.
    pub fn remove_item_from_slot(&mut self, slot: &GameplayTag) -> Result<ItemId, StoreError> {
        self.ensure_authority()?;
        let id = self
            .items
            .item_from_slot(slot)
            .map(ItemData::id)
            .ok_or_else(|| StoreError::SlotEmpty { slot: slot.clone() })?;

        self.clear_slot(id, slot.clone());
        Ok(id)
    }

    /// Takes an item off whatever slot it holds; returns that slot.
    pub fn remove_item_from_any_slot(&mut self, id: ItemId) -> Result<GameplayTag, StoreError> {
        self.ensure_authority()?;
        let slot = self
            .require_item(id)?
            .slot()
            .cloned()
            .ok_or(StoreError::NotOnSlot { item: id })?;

        self.clear_slot(id, slot.clone());
        Ok(slot)
    }

    /// Moves an item to `slot`, clearing its old mapping first.
    ///
    /// Items that are not on any slot are simply slotted.
    pub fn change_item_slot(&mut self, id: ItemId, slot: &GameplayTag) -> Result<(), StoreError> {
        self.add_item_to_slot(id, slot)
    }

    fn clear_slot(&mut self, id: ItemId, slot: GameplayTag) {
        self.items.modify(id, |item| item.set_slot(None));
        debug!(store = %self.id, item = %id, slot = %slot, "item unslotted");
        self.events
            .push(StoreEvent::RemovedFromSlot { item: id, slot });
    }
}
