use tracing::{debug, info};

use super::{available_item, item_ref, store_mut, store_ref};
use crate::command::{
    CommandError, CommandOutcome, ReplicatedCommand, TaggedCommand, VersionGuard,
};
use crate::id::{ItemId, StoreId};
use crate::spec::ItemSpec;
use crate::store::{ItemsStore, ItemsStores, StoreError};

/// Removes stacks of a droppable item and describes what left the store.
///
/// `stacks <= 0` or at least the current count drops the whole record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DropItem {
    pub store: StoreId,
    pub item: ItemId,
    pub stacks: i32,
    #[cfg_attr(feature = "serde", serde(default))]
    guard: VersionGuard,
}

impl DropItem {
    pub fn new(store: StoreId, item: ItemId, stacks: i32) -> Self {
        Self {
            store,
            item,
            stacks,
            guard: VersionGuard::new(),
        }
    }

    pub fn all(store: StoreId, item: ItemId) -> Self {
        Self::new(store, item, 0)
    }

    fn ensure_droppable(&self, store: &ItemsStore) -> Result<(), CommandError> {
        match store.definition_of(self.item) {
            Some(definition) if definition.droppable => Ok(()),
            Some(_) => Err(CommandError::NotDroppable { item: self.item }),
            None => Err(CommandError::ItemNotFound {
                store: self.store,
                item: self.item,
            }),
        }
    }
}

impl TaggedCommand for DropItem {
    const TAG: &'static str = "drop_item";
}

impl ReplicatedCommand for DropItem {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, stores: &ItemsStores) -> Result<(), CommandError> {
        let store = store_ref(stores, self.store)?;
        available_item(store, self.item)?;
        self.ensure_droppable(store)
    }

    fn pre_send_command(&mut self, stores: &mut ItemsStores) {
        self.guard.track(stores, self.store, self.item);
        self.guard.lock_item(stores, self.store, self.item);
    }

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        self.guard.validate(stores)?;
        let store = store_mut(stores, self.store)?;
        self.ensure_droppable(store)?;

        let item = item_ref(store, self.item)?;
        let current = item.stacks();
        if current == 0 {
            return Err(CommandError::store_item(
                self.store,
                self.item,
                StoreError::InvalidAmount,
            ));
        }

        let drop_all = self.stacks <= 0 || self.stacks >= i32::from(current);
        let amount = if drop_all { current } else { self.stacks as u16 };
        let dropped = ItemSpec::from_item(item)
            .with_item_id(ItemId::generate())
            .with_amount(amount);

        store
            .remove_item(self.item, i32::from(amount), drop_all)
            .map_err(|error| CommandError::store_item(self.store, self.item, error))?;

        info!(
            store = %self.store,
            item = %self.item,
            amount,
            dropped = %dropped.item_id,
            "item dropped"
        );
        Ok(CommandOutcome::Dropped(dropped))
    }

    fn command_confirmed(&mut self, stores: &mut ItemsStores, success: bool) {
        self.guard.release(stores);
        debug!(item = %self.item, success, "drop confirmed");
    }
}
