//! Collection of stores one role operates on.

use std::collections::BTreeMap;

use super::{ItemsStore, StoreEvent};
use crate::id::StoreId;

/// Stores keyed by id. Commands resolve every store they touch through this.
#[derive(Clone, Debug, Default)]
pub struct ItemsStores {
    stores: BTreeMap<StoreId, ItemsStore>,
}

impl ItemsStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store, returning any store previously held under its id.
    pub fn insert(&mut self, store: ItemsStore) -> Option<ItemsStore> {
        self.stores.insert(store.id(), store)
    }

    pub fn remove(&mut self, id: StoreId) -> Option<ItemsStore> {
        self.stores.remove(&id)
    }

    pub fn get(&self, id: StoreId) -> Option<&ItemsStore> {
        self.stores.get(&id)
    }

    pub fn get_mut(&mut self, id: StoreId) -> Option<&mut ItemsStore> {
        self.stores.get_mut(&id)
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.stores.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = StoreId> + '_ {
        self.stores.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemsStore> {
        self.stores.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ItemsStore> {
        self.stores.values_mut()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Lends two distinct stores mutably at once.
    ///
    /// Returns `None` if `a == b` or either store is missing. The pair comes
    /// back in argument order.
    pub fn pair_mut(
        &mut self,
        a: StoreId,
        b: StoreId,
    ) -> Option<(&mut ItemsStore, &mut ItemsStore)> {
        if a == b {
            return None;
        }

        let mut first = None;
        let mut second = None;
        for (id, store) in self.stores.iter_mut() {
            if *id == a {
                first = Some(store);
            } else if *id == b {
                second = Some(store);
            }
        }
        Some((first?, second?))
    }

    /// Drains events from every store, tagged with the store they came from.
    pub fn drain_events(&mut self) -> Vec<(StoreId, StoreEvent)> {
        self.stores
            .iter_mut()
            .flat_map(|(id, store)| {
                let id = *id;
                store
                    .drain_events()
                    .into_iter()
                    .map(move |event| (id, event))
            })
            .collect()
    }
}

impl FromIterator<ItemsStore> for ItemsStores {
    fn from_iter<T: IntoIterator<Item = ItemsStore>>(iter: T) -> Self {
        let mut stores = Self::new();
        for store in iter {
            stores.insert(store);
        }
        stores
    }
}
