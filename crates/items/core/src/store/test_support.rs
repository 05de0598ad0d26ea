//! Fixture definitions and stores shared by unit tests across the crate.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ItemsStore, ItemsStores};
use crate::definition::{DefinitionId, DefinitionOracle, ItemDefinition, SocketSlot};
use crate::id::StoreId;
use crate::stack::{ScalableStacks, StackMethod};
use crate::tag::GameplayTag;

pub(crate) const INVENTORY: StoreId = StoreId(1);
pub(crate) const STASH: StoreId = StoreId(2);

pub(crate) fn tag(name: &str) -> GameplayTag {
    GameplayTag::new(name).unwrap()
}

#[derive(Debug, Default)]
pub(crate) struct FixtureDefinitions {
    definitions: HashMap<DefinitionId, ItemDefinition>,
}

impl FixtureDefinitions {
    pub(crate) fn new() -> Self {
        let mut fixture = Self::default();
        for definition in [
            ItemDefinition::new("sword", "Sword").with_tag(tag("Item.Weapon.Sword")),
            ItemDefinition::new("shield", "Shield").with_tag(tag("Item.Armor.Shield")),
            ItemDefinition::new("arrow", "Arrow")
                .with_stack_method(StackMethod::StackByType {
                    max_stacks: ScalableStacks::flat(5),
                })
                .with_tag(tag("Item.Ammo")),
            ItemDefinition::new("potion", "Potion")
                .with_stack_method(StackMethod::StackByType {
                    max_stacks: ScalableStacks::flat(20),
                })
                .droppable(),
            ItemDefinition::new("amulet", "Amulet")
                .with_stack_method(StackMethod::CanNotStackUnique),
            ItemDefinition::new("bow", "Bow")
                .with_tag(tag("Item.Weapon.Bow"))
                .with_socket(SocketSlot::new(tag("Socket.Scope"))),
            ItemDefinition::new("rifle", "Rifle")
                .with_tag(tag("Item.Weapon.Rifle"))
                .with_socket(SocketSlot::new(tag("Socket.Scope")).with_default("scope".into()))
                .droppable(),
            ItemDefinition::new("scope", "Scope").with_socket(SocketSlot::new(tag("Socket.Lens"))),
            ItemDefinition::new("lens", "Lens"),
            ItemDefinition::new("link", "Chain link")
                .with_socket(SocketSlot::new(tag("Socket.Link"))),
        ] {
            fixture.definitions.insert(definition.id.clone(), definition);
        }
        fixture
    }
}

impl DefinitionOracle for FixtureDefinitions {
    fn definition(&self, id: &DefinitionId) -> Option<&ItemDefinition> {
        self.definitions.get(id)
    }

    fn all_definitions(&self) -> Vec<&ItemDefinition> {
        self.definitions.values().collect()
    }
}

pub(crate) fn definitions() -> Arc<dyn DefinitionOracle> {
    Arc::new(FixtureDefinitions::new())
}

/// Authority store with the fixture definitions.
pub(crate) fn fixture_store() -> ItemsStore {
    ItemsStore::authority(INVENTORY, definitions())
}

/// Client replica of [`fixture_store`].
pub(crate) fn client_store() -> ItemsStore {
    ItemsStore::client(INVENTORY, definitions())
}

/// Authority stores for the inventory and a second stash.
pub(crate) fn authority_stores() -> ItemsStores {
    let definitions = definitions();
    let mut stores = ItemsStores::new();
    stores.insert(ItemsStore::authority(INVENTORY, Arc::clone(&definitions)));
    stores.insert(ItemsStore::authority(STASH, definitions));
    stores
}

/// Client replicas matching [`authority_stores`].
pub(crate) fn client_stores() -> ItemsStores {
    let definitions = definitions();
    let mut stores = ItemsStores::new();
    stores.insert(ItemsStore::client(INVENTORY, Arc::clone(&definitions)));
    stores.insert(ItemsStore::client(STASH, definitions));
    stores
}

/// Brings every replica in `clients` up to date with `authority`.
pub(crate) fn sync(authority: &ItemsStores, clients: &mut ItemsStores) {
    for store in authority.iter() {
        let replica = clients.get_mut(store.id()).unwrap();
        let delta = store.delta_since(replica.items_array().applied_key());
        replica.apply_replication(&delta).unwrap();
        replica.drain_events();
    }
}
