//! Creation requests for new or merged items.

use std::collections::BTreeMap;

use crate::data::ItemData;
use crate::definition::DefinitionId;
use crate::id::ItemId;
use crate::tag::{GameplayTag, TagContainer};

/// Request payload used to create an item or merge into an existing stack.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemSpec {
    /// Preassigned id; [`ItemId::INVALID`] lets the store generate one.
    pub item_id: ItemId,
    pub definition: DefinitionId,
    pub amount: u16,
    pub level: u8,
    pub dynamic_tags: TagContainer,
    pub stat_overrides: BTreeMap<String, i32>,
}

impl ItemSpec {
    pub fn new(definition: impl Into<DefinitionId>, amount: u16) -> Self {
        Self {
            item_id: ItemId::INVALID,
            definition: definition.into(),
            amount,
            level: 1,
            dynamic_tags: TagContainer::new(),
            stat_overrides: BTreeMap::new(),
        }
    }

    pub fn with_item_id(mut self, item_id: ItemId) -> Self {
        self.item_id = item_id;
        self
    }

    pub fn with_amount(mut self, amount: u16) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_dynamic_tag(mut self, tag: GameplayTag) -> Self {
        self.dynamic_tags.insert(tag);
        self
    }

    pub fn with_stat_override(mut self, stat: impl Into<String>, value: i32) -> Self {
        self.stat_overrides.insert(stat.into(), value);
        self
    }

    /// Captures the persistent state of an existing record as a spec.
    ///
    /// Keeps the record's id so the result can recreate the same item elsewhere.
    pub fn from_item(item: &ItemData) -> Self {
        Self {
            item_id: item.id(),
            definition: item.definition().clone(),
            amount: item.stacks(),
            level: item.level(),
            dynamic_tags: item.dynamic_tags().clone(),
            stat_overrides: item.stat_overrides().clone(),
        }
    }
}
