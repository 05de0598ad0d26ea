//! Item record stored in an [`crate::ItemsArray`].

use std::collections::BTreeMap;

use crate::definition::DefinitionId;
use crate::id::ItemId;
use crate::spec::ItemSpec;
use crate::tag::{GameplayTag, TagContainer};

/// One authoritative item record.
///
/// Fields are private: every mutation goes through the owning array so the
/// record's `version` and replication key move together.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemData {
    id: ItemId,
    definition: DefinitionId,
    version: u32,
    stacks: u16,
    level: u8,
    slot: Option<GameplayTag>,
    owner: Option<ItemId>,
    attach_slot: Option<GameplayTag>,
    dynamic_tags: TagContainer,
    stat_overrides: BTreeMap<String, i32>,
}

impl ItemData {
    pub(crate) fn from_spec(id: ItemId, spec: &ItemSpec) -> Self {
        Self {
            id,
            definition: spec.definition.clone(),
            version: 0,
            stacks: spec.amount,
            level: spec.level,
            slot: None,
            owner: None,
            attach_slot: None,
            dynamic_tags: spec.dynamic_tags.clone(),
            stat_overrides: spec.stat_overrides.clone(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn definition(&self) -> &DefinitionId {
        &self.definition
    }

    /// Monotonic counter bumped on every authoritative mutation.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn stacks(&self) -> u16 {
        self.stacks
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn slot(&self) -> Option<&GameplayTag> {
        self.slot.as_ref()
    }

    /// Parent item this record is attached to.
    pub fn owner(&self) -> Option<ItemId> {
        self.owner
    }

    pub fn attach_slot(&self) -> Option<&GameplayTag> {
        self.attach_slot.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    pub fn dynamic_tags(&self) -> &TagContainer {
        &self.dynamic_tags
    }

    pub fn stat_overrides(&self) -> &BTreeMap<String, i32> {
        &self.stat_overrides
    }

    pub(crate) fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub(crate) fn set_stacks(&mut self, stacks: u16) {
        self.stacks = stacks;
    }

    pub(crate) fn set_slot(&mut self, slot: Option<GameplayTag>) {
        self.slot = slot;
    }

    pub(crate) fn attach_to(&mut self, owner: ItemId, attach_slot: GameplayTag) {
        self.owner = Some(owner);
        self.attach_slot = Some(attach_slot);
    }

    pub(crate) fn detach(&mut self) {
        self.owner = None;
        self.attach_slot = None;
    }

    pub(crate) fn dynamic_tags_mut(&mut self) -> &mut TagContainer {
        &mut self.dynamic_tags
    }
}
