//! Item store facade.
//!
//! [`ItemsStore`] owns one [`ItemsArray`] and is the only writer to it. It
//! runs the stacking policy on add, keeps slot and attachment bookkeeping
//! consistent, and carries the client-only prediction locks next to (never
//! inside) the authoritative records.
//!
//! Submodules split the surface by concern:
//! - `slots`: standalone slot mapping (slot → at most one item)
//! - `attachments`: parent/child attachment graph, kept acyclic
//! - `copy`: item copy containers and cross-store moves
//! - `locks`: prediction locks and the pending-item set
//! - `set`: [`ItemsStores`], the per-role collection commands run against

mod attachments;
mod copy;
mod error;
mod events;
mod locks;
mod set;
mod slots;

#[cfg(test)]
pub(crate) mod test_support;

pub use copy::{AttachmentCopy, ItemCopyContainer};
pub use error::StoreError;
pub use events::StoreEvent;
pub use locks::PredictionLocks;
pub use set::ItemsStores;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::array::{ItemsArray, ItemsDelta, ReplicationNotify};
use crate::data::ItemData;
use crate::definition::{DefinitionId, DefinitionOracle, ItemDefinition};
use crate::id::{ItemId, StoreId};
use crate::spec::ItemSpec;
use crate::stack::{StackMethod, StackPolicy};
use crate::tag::{GameplayTag, TagContainer};

/// Which side of the connection a store lives on.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum NetRole {
    /// Owns the truth; executes commands.
    Authority,
    /// Holds a replica; only prediction locks are local.
    Client,
}

#[derive(Clone)]
pub struct ItemsStore {
    id: StoreId,
    role: NetRole,
    items: ItemsArray,
    definitions: Arc<dyn DefinitionOracle>,
    locks: PredictionLocks,
    events: Vec<StoreEvent>,
}

impl fmt::Debug for ItemsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemsStore")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("items", &self.items.len())
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl ItemsStore {
    pub fn new(id: StoreId, role: NetRole, definitions: Arc<dyn DefinitionOracle>) -> Self {
        Self {
            id,
            role,
            items: ItemsArray::new(),
            definitions,
            locks: PredictionLocks::new(),
            events: Vec::new(),
        }
    }

    pub fn authority(id: StoreId, definitions: Arc<dyn DefinitionOracle>) -> Self {
        Self::new(id, NetRole::Authority, definitions)
    }

    pub fn client(id: StoreId, definitions: Arc<dyn DefinitionOracle>) -> Self {
        Self::new(id, NetRole::Client, definitions)
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn has_authority(&self) -> bool {
        self.role == NetRole::Authority
    }

    /// Read-only view of the records, for UI and replication.
    pub fn items_array(&self) -> &ItemsArray {
        &self.items
    }

    pub fn definitions(&self) -> &dyn DefinitionOracle {
        self.definitions.as_ref()
    }

    pub fn definition_of(&self, item: ItemId) -> Option<&ItemDefinition> {
        let item = self.items.get(item)?;
        self.definitions.definition(item.definition())
    }

    pub fn item(&self, id: ItemId) -> Option<&ItemData> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemData> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Takes every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn ensure_authority(&self) -> Result<(), StoreError> {
        if self.has_authority() {
            Ok(())
        } else {
            Err(StoreError::NotAuthority { store: self.id })
        }
    }

    pub(crate) fn require_item(&self, id: ItemId) -> Result<&ItemData, StoreError> {
        self.items
            .get(id)
            .ok_or(StoreError::ItemNotFound { item: id })
    }

    // ===== item lifecycle =====

    /// Adds an item, merging into an existing stack when the definition's
    /// stack method allows it.
    ///
    /// Returns the id of the record that received the stacks: the existing
    /// record when everything merged, otherwise the first new record.
    pub fn add_item(&mut self, spec: &ItemSpec) -> Result<ItemId, StoreError> {
        self.add_record(spec, None, true)
    }

    /// Adds exactly one new record, never merging into an existing stack.
    ///
    /// Fails with [`StoreError::InvalidAmount`] when `spec.amount` exceeds
    /// the definition's stack cap.
    pub fn add_new_item(&mut self, spec: &ItemSpec) -> Result<ItemId, StoreError> {
        self.add_record(spec, None, false)
    }

    /// Attached adds always create a single record; `merge` only applies to
    /// standalone adds.
    pub(crate) fn add_record(
        &mut self,
        spec: &ItemSpec,
        attach: Option<(ItemId, GameplayTag)>,
        merge: bool,
    ) -> Result<ItemId, StoreError> {
        self.ensure_authority()?;
        if spec.amount == 0 {
            return Err(StoreError::InvalidAmount);
        }

        let definitions = Arc::clone(&self.definitions);
        let definition = definitions.definition(&spec.definition).ok_or_else(|| {
            StoreError::UnknownDefinition {
                definition: spec.definition.clone(),
            }
        })?;

        if spec.item_id.is_valid() && self.items.contains(spec.item_id) {
            return Err(StoreError::AlreadyExists { item: spec.item_id });
        }
        if let Some((owner, slot)) = &attach {
            self.check_attach_target(*owner, slot, None)?;
        }

        let method = definition.stack_method;
        if !method.can_add(&self.items, spec) {
            return Err(StoreError::CannotAdd {
                definition: spec.definition.clone(),
            });
        }

        let cap = match method {
            StackMethod::StackByType { max_stacks } => max_stacks.at(spec.level),
            StackMethod::CanNotStack | StackMethod::CanNotStackUnique => u16::MAX,
        };
        // A socket holds one attachment, so a single record must carry the amount.
        let single = attach.is_some() || !merge;
        if single && spec.amount > cap {
            return Err(StoreError::InvalidAmount);
        }

        let mut remaining = spec.amount;
        if !single && method.can_stack(&self.items, spec) {
            if let Some(outcome) = method.stack_check(&self.items, spec) {
                self.items
                    .modify(outcome.existing, |item| item.set_stacks(outcome.new_stacks));
                self.events.push(StoreEvent::StacksChanged {
                    item: outcome.existing,
                    stacks: outcome.new_stacks,
                });
                debug!(
                    store = %self.id,
                    item = %outcome.existing,
                    stacks = outcome.new_stacks,
                    remaining = outcome.remaining_stacks,
                    "merged into existing stack"
                );

                if outcome.remaining_stacks == 0 {
                    return Ok(outcome.existing);
                }
                remaining = outcome.remaining_stacks;
            }
        }

        let mut first = None;
        while remaining > 0 {
            let id = match first {
                None if spec.item_id.is_valid() => spec.item_id,
                _ => ItemId::generate(),
            };
            let stacks = remaining.min(cap);
            remaining -= stacks;

            self.insert_new_record(id, spec, stacks, attach.clone(), definition);
            first.get_or_insert(id);
        }

        // amount > 0 guarantees at least one record.
        first.ok_or(StoreError::InvalidAmount)
    }

    fn insert_new_record(
        &mut self,
        id: ItemId,
        spec: &ItemSpec,
        stacks: u16,
        attach: Option<(ItemId, GameplayTag)>,
        definition: &ItemDefinition,
    ) {
        let mut record = ItemData::from_spec(id, spec);
        record.set_stacks(stacks);
        if let Some((owner, slot)) = &attach {
            record.attach_to(*owner, slot.clone());
        }
        self.items.insert(record);

        self.events.push(StoreEvent::ItemAdded {
            item: id,
            definition: spec.definition.clone(),
            stacks,
        });
        if let Some((owner, slot)) = attach {
            self.events.push(StoreEvent::Attached {
                owner,
                attachment: id,
                slot,
            });
        }
        info!(
            store = %self.id,
            item = %id,
            definition = %spec.definition,
            stacks,
            "item added"
        );

        for socket in &definition.socket_slots {
            let Some(default) = &socket.default_attachment else {
                continue;
            };
            let spec = ItemSpec::new(default.clone(), 1).with_level(spec.level);
            let attach = Some((id, socket.slot.clone()));
            if let Err(error) = self.add_record(&spec, attach, false) {
                warn!(
                    store = %self.id,
                    owner = %id,
                    slot = %socket.slot,
                    %error,
                    "failed to create default attachment"
                );
            }
        }
    }

    /// Removes `stacks` from an item.
    ///
    /// A negative `stacks` means "all of them". When the item runs out and
    /// `remove_on_zero` is set, the record and everything attached to it are
    /// removed; otherwise the record stays with zero stacks.
    pub fn remove_item(
        &mut self,
        id: ItemId,
        stacks: i32,
        remove_on_zero: bool,
    ) -> Result<(), StoreError> {
        self.ensure_authority()?;
        let current = i32::from(self.require_item(id)?.stacks());
        let exhausted = stacks < 0 || current <= stacks;

        if exhausted && remove_on_zero {
            let removed = self.take_tree(id);
            info!(store = %self.id, item = %id, records = removed.len(), "item removed");
            return Ok(());
        }

        let remaining = if exhausted { 0 } else { (current - stacks) as u16 };
        if i32::from(remaining) == current {
            return Ok(());
        }

        self.items.modify(id, |item| item.set_stacks(remaining));
        self.events.push(StoreEvent::StacksChanged {
            item: id,
            stacks: remaining,
        });
        debug!(store = %self.id, item = %id, stacks = remaining, "stacks removed");
        Ok(())
    }

    /// Destroys an item and, recursively, everything attached to it.
    ///
    /// The item is detached from its owner and cleared from its slot as part
    /// of the removal.
    pub fn destroy_item(&mut self, id: ItemId) -> Result<(), StoreError> {
        self.ensure_authority()?;
        self.require_item(id)?;

        let removed = self.take_tree(id);
        info!(store = %self.id, item = %id, records = removed.len(), "item destroyed");
        Ok(())
    }

    /// Ids of `root` and every item attached beneath it, root first.
    pub(crate) fn subtree(&self, root: ItemId) -> Vec<ItemId> {
        let mut order = vec![root];
        let mut seen: HashSet<ItemId> = HashSet::from([root]);
        let mut cursor = 0;

        while cursor < order.len() {
            let parent = order[cursor];
            cursor += 1;
            for child in self.items.items_attached_to(parent) {
                if seen.insert(child.id()) {
                    order.push(child.id());
                }
            }
        }
        order
    }

    /// Removes `root` and its attachments, children first.
    ///
    /// Returns the removed records root first.
    pub(crate) fn take_tree(&mut self, root: ItemId) -> Vec<ItemData> {
        let order = self.subtree(root);
        let mut removed = Vec::with_capacity(order.len());

        for id in order.iter().rev() {
            let Some(item) = self.items.remove(*id) else {
                continue;
            };

            if let Some(slot) = item.slot() {
                self.events.push(StoreEvent::RemovedFromSlot {
                    item: *id,
                    slot: slot.clone(),
                });
            }
            if *id == root {
                if let (Some(owner), Some(slot)) = (item.owner(), item.attach_slot()) {
                    self.events.push(StoreEvent::Detached {
                        owner,
                        attachment: *id,
                        slot: slot.clone(),
                    });
                }
            }
            self.events.push(StoreEvent::ItemRemoved {
                item: *id,
                definition: item.definition().clone(),
            });
            removed.push(item);
        }

        removed.reverse();
        removed
    }

    // ===== lookups =====

    pub fn item_by_definition(&self, definition: &DefinitionId) -> Option<&ItemData> {
        self.items.find_by_definition(definition)
    }

    pub fn contains_definition(&self, definition: &DefinitionId) -> bool {
        self.items.find_by_definition(definition).is_some()
    }

    /// Total stacks held across every record of `definition`.
    pub fn count_items_by_definition(&self, definition: &DefinitionId) -> u32 {
        self.items
            .iter()
            .filter(|item| item.definition() == definition)
            .map(|item| u32::from(item.stacks()))
            .sum()
    }

    /// First item whose definition tags plus dynamic tags cover `query`.
    pub fn item_by_tags(&self, query: &TagContainer) -> Option<&ItemData> {
        self.items.iter().find(|item| {
            let mut tags = self
                .definitions
                .definition(item.definition())
                .map(|definition| definition.tags.clone())
                .unwrap_or_default();
            tags.extend(item.dynamic_tags());
            tags.has_all(query)
        })
    }

    // ===== dynamic tags =====

    /// Returns false if the tag was already present.
    pub fn add_dynamic_tag(&mut self, id: ItemId, tag: GameplayTag) -> Result<bool, StoreError> {
        self.ensure_authority()?;
        if self.require_item(id)?.dynamic_tags().contains_exact(&tag) {
            return Ok(false);
        }
        self.items
            .modify(id, |item| item.dynamic_tags_mut().insert(tag));
        self.events.push(StoreEvent::DynamicTagsChanged { item: id });
        Ok(true)
    }

    /// Returns false if the tag was not present.
    pub fn remove_dynamic_tag(&mut self, id: ItemId, tag: &GameplayTag) -> Result<bool, StoreError> {
        self.ensure_authority()?;
        if !self.require_item(id)?.dynamic_tags().contains_exact(tag) {
            return Ok(false);
        }
        self.items
            .modify(id, |item| item.dynamic_tags_mut().remove(tag));
        self.events.push(StoreEvent::DynamicTagsChanged { item: id });
        Ok(true)
    }

    // ===== replication =====

    pub fn delta_since(&self, key: u64) -> ItemsDelta {
        self.items.delta_since(key)
    }

    pub fn compact_tombstones(&mut self, acked_key: u64) {
        self.items.compact_tombstones(acked_key);
    }

    /// Folds an authority delta into this replica and emits matching events.
    ///
    /// Returns the number of records that changed.
    pub fn apply_replication(&mut self, delta: &ItemsDelta) -> Result<usize, StoreError> {
        if self.has_authority() {
            return Err(StoreError::NotReplica { store: self.id });
        }

        let previous: HashMap<ItemId, ItemData> = if delta.full {
            self.items.iter().map(|item| (item.id(), item.clone())).collect()
        } else {
            delta
                .upserts
                .iter()
                .map(ItemData::id)
                .chain(delta.removals.iter().copied())
                .filter_map(|id| self.items.get(id).map(|item| (id, item.clone())))
                .collect()
        };

        let notifications = self.items.apply_delta(delta)?;
        for notification in &notifications {
            self.emit_replicated(notification, &previous);
        }

        debug!(
            store = %self.id,
            changes = notifications.len(),
            key = delta.to_key,
            "applied replication delta"
        );
        Ok(notifications.len())
    }

    fn emit_replicated(
        &mut self,
        notification: &ReplicationNotify,
        previous: &HashMap<ItemId, ItemData>,
    ) {
        match notification {
            ReplicationNotify::Added(id) => {
                let Some(item) = self.items.get(*id) else {
                    return;
                };
                let mut events = vec![StoreEvent::ItemAdded {
                    item: *id,
                    definition: item.definition().clone(),
                    stacks: item.stacks(),
                }];
                if let Some(slot) = item.slot() {
                    events.push(StoreEvent::AddedToSlot {
                        item: *id,
                        slot: slot.clone(),
                    });
                }
                self.events.extend(events);
            }
            ReplicationNotify::Removed(id) => {
                if let Some(item) = previous.get(id) {
                    if let Some(slot) = item.slot() {
                        self.events.push(StoreEvent::RemovedFromSlot {
                            item: *id,
                            slot: slot.clone(),
                        });
                    }
                    self.events.push(StoreEvent::ItemRemoved {
                        item: *id,
                        definition: item.definition().clone(),
                    });
                }
            }
            ReplicationNotify::Changed { id, version } => {
                let (Some(before), Some(after)) = (previous.get(id), self.items.get(*id)) else {
                    return;
                };
                let mut events = Vec::new();
                match (before.slot(), after.slot()) {
                    (None, Some(to)) => events.push(StoreEvent::AddedToSlot {
                        item: *id,
                        slot: to.clone(),
                    }),
                    (Some(from), None) => events.push(StoreEvent::RemovedFromSlot {
                        item: *id,
                        slot: from.clone(),
                    }),
                    (Some(from), Some(to)) if from != to => events.push(StoreEvent::SlotChanged {
                        item: *id,
                        from: from.clone(),
                        to: to.clone(),
                    }),
                    _ => {}
                }
                if before.stacks() != after.stacks() {
                    events.push(StoreEvent::StacksChanged {
                        item: *id,
                        stacks: after.stacks(),
                    });
                }
                if events.is_empty() {
                    events.push(StoreEvent::ItemChanged {
                        item: *id,
                        version: *version,
                    });
                }
                self.events.extend(events);
            }
        }
    }
}
