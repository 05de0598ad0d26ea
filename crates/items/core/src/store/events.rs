//! Notifications emitted by store mutations and replication.

use crate::definition::DefinitionId;
use crate::id::ItemId;
use crate::tag::GameplayTag;

/// Something observable happened to a store.
///
/// Authority stores emit these from their own mutations; replicas emit them
/// while folding in deltas. Consumers drain them with
/// [`super::ItemsStore::drain_events`].
#[derive(Clone, Debug, PartialEq, Eq, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum StoreEvent {
    ItemAdded {
        item: ItemId,
        definition: DefinitionId,
        stacks: u16,
    },
    ItemRemoved {
        item: ItemId,
        definition: DefinitionId,
    },
    StacksChanged {
        item: ItemId,
        stacks: u16,
    },
    /// Replicated record changed without a more specific event.
    ItemChanged {
        item: ItemId,
        version: u32,
    },
    AddedToSlot {
        item: ItemId,
        slot: GameplayTag,
    },
    RemovedFromSlot {
        item: ItemId,
        slot: GameplayTag,
    },
    SlotChanged {
        item: ItemId,
        from: GameplayTag,
        to: GameplayTag,
    },
    Attached {
        owner: ItemId,
        attachment: ItemId,
        slot: GameplayTag,
    },
    Detached {
        owner: ItemId,
        attachment: ItemId,
        slot: GameplayTag,
    },
    DynamicTagsChanged {
        item: ItemId,
    },
    /// Client-only: an item entered or left the pending set.
    PendingChanged {
        item: ItemId,
        pending: bool,
    },
}

impl StoreEvent {
    /// Primary item the event concerns.
    pub fn item(&self) -> ItemId {
        match self {
            Self::ItemAdded { item, .. }
            | Self::ItemRemoved { item, .. }
            | Self::StacksChanged { item, .. }
            | Self::ItemChanged { item, .. }
            | Self::AddedToSlot { item, .. }
            | Self::RemovedFromSlot { item, .. }
            | Self::SlotChanged { item, .. }
            | Self::DynamicTagsChanged { item }
            | Self::PendingChanged { item, .. } => *item,
            Self::Attached { attachment, .. } | Self::Detached { attachment, .. } => *attachment,
        }
    }
}
