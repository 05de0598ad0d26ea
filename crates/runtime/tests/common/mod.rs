#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use items_core::{GameplayTag, StoreId};
use items_runtime::{DefinitionOracleImpl, Runtime, RuntimeBuilder, RuntimeConfig};

pub const INVENTORY: StoreId = StoreId(1);
pub const STASH: StoreId = StoreId(2);

pub const CATALOG: &str = r#"
(
    items: [
        (id: "sword", name: "Sword", tags: ["Item.Weapon.Sword"]),
        (id: "shield", name: "Shield", tags: ["Item.Armor.Shield"]),
        (
            id: "potion",
            name: "Potion",
            stack_method: StackByType(max_stacks: (base: 20)),
            droppable: true,
        ),
        (
            id: "arrow",
            name: "Arrow",
            stack_method: StackByType(max_stacks: (base: 5)),
            tags: ["Item.Ammo"],
            droppable: true,
        ),
        (
            id: "rifle",
            name: "Rifle",
            socket_slots: [(slot: "Socket.Scope", default_attachment: Some("scope"))],
        ),
        (id: "scope", name: "Scope"),
    ],
)
"#;

pub fn tag(name: &str) -> GameplayTag {
    GameplayTag::new(name).unwrap()
}

pub fn definitions() -> Arc<DefinitionOracleImpl> {
    Arc::new(DefinitionOracleImpl::from_ron_str(CATALOG).unwrap())
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig {
        command_timeout: Duration::from_secs(2),
        ..RuntimeConfig::default()
    }
}

pub fn builder() -> RuntimeBuilder {
    Runtime::builder()
        .config(config())
        .definitions(definitions())
        .stores([INVENTORY, STASH])
}
