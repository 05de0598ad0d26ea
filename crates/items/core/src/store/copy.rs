//! Item copy containers and cross-store moves.
//!
//! A copy container captures one root item, its standalone slot and the full
//! tree of its attachments. Containers are what persistence writes to disk
//! and what moves between stores carry.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use super::{ItemsStore, StoreError, StoreEvent};
use crate::data::ItemData;
use crate::id::ItemId;
use crate::spec::ItemSpec;
use crate::tag::GameplayTag;

/// One attachment inside an [`ItemCopyContainer`], with its own subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachmentCopy {
    pub attach_slot: GameplayTag,
    pub spec: ItemSpec,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attachments: Vec<AttachmentCopy>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemCopyContainer {
    pub spec: ItemSpec,
    #[cfg_attr(feature = "serde", serde(default))]
    pub slot: Option<GameplayTag>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attachments: Vec<AttachmentCopy>,
}

impl ItemCopyContainer {
    /// Every spec in the container, root first.
    pub fn specs(&self) -> Vec<&ItemSpec> {
        fn walk<'a>(attachments: &'a [AttachmentCopy], out: &mut Vec<&'a ItemSpec>) {
            for attachment in attachments {
                out.push(&attachment.spec);
                walk(&attachment.attachments, out);
            }
        }

        let mut out = vec![&self.spec];
        walk(&self.attachments, &mut out);
        out
    }
}

impl ItemsStore {
    /// Captures an item and its attachments.
    pub fn copy_container(&self, id: ItemId) -> Option<ItemCopyContainer> {
        let item = self.items.get(id)?;
        Some(ItemCopyContainer {
            spec: ItemSpec::from_item(item),
            slot: item.slot().cloned(),
            attachments: self.copy_attachments(id),
        })
    }

    fn copy_attachments(&self, owner: ItemId) -> Vec<AttachmentCopy> {
        self.items
            .items_attached_to(owner)
            .into_iter()
            .filter_map(|item| {
                Some(AttachmentCopy {
                    attach_slot: item.attach_slot()?.clone(),
                    spec: ItemSpec::from_item(item),
                    attachments: self.copy_attachments(item.id()),
                })
            })
            .collect()
    }

    /// Recreates a captured item tree, keeping preassigned ids.
    ///
    /// Stack merging and default attachments are skipped; the container is
    /// restored exactly. The root is put back on its slot. Returns the new
    /// record ids, root first.
    pub fn add_copy_container(
        &mut self,
        container: &ItemCopyContainer,
    ) -> Result<Vec<ItemId>, StoreError> {
        self.ensure_authority()?;
        self.validate_container(container)?;

        let root = resolve_id(&container.spec);
        let mut added = Vec::new();

        let mut record = ItemData::from_spec(root, &container.spec);
        record.set_slot(container.slot.clone());
        self.place_record(record);
        added.push(root);

        self.restore_attachments(root, &container.attachments, &mut added);

        info!(store = %self.id, item = %root, records = added.len(), "copy container restored");
        Ok(added)
    }

    fn validate_container(&self, container: &ItemCopyContainer) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for spec in container.specs() {
            if spec.amount == 0 {
                return Err(StoreError::InvalidAmount);
            }
            if self.definitions.definition(&spec.definition).is_none() {
                return Err(StoreError::UnknownDefinition {
                    definition: spec.definition.clone(),
                });
            }
            if spec.item_id.is_valid()
                && (self.items.contains(spec.item_id) || !seen.insert(spec.item_id))
            {
                return Err(StoreError::AlreadyExists { item: spec.item_id });
            }
        }

        if let Some(slot) = &container.slot {
            if let Some(occupant) = self.items.item_from_slot(slot) {
                return Err(StoreError::SlotOccupied {
                    slot: slot.clone(),
                    occupant: occupant.id(),
                });
            }
        }
        Ok(())
    }

    fn restore_attachments(
        &mut self,
        owner: ItemId,
        attachments: &[AttachmentCopy],
        added: &mut Vec<ItemId>,
    ) {
        for attachment in attachments {
            let id = resolve_id(&attachment.spec);
            let mut record = ItemData::from_spec(id, &attachment.spec);
            record.attach_to(owner, attachment.attach_slot.clone());
            self.place_record(record);
            added.push(id);

            self.restore_attachments(id, &attachment.attachments, added);
        }
    }

    /// Inserts a fully formed record and emits the matching events.
    fn place_record(&mut self, record: ItemData) {
        let id = record.id();
        let mut events = vec![StoreEvent::ItemAdded {
            item: id,
            definition: record.definition().clone(),
            stacks: record.stacks(),
        }];
        if let (Some(owner), Some(slot)) = (record.owner(), record.attach_slot()) {
            events.push(StoreEvent::Attached {
                owner,
                attachment: id,
                slot: slot.clone(),
            });
        }
        if let Some(slot) = record.slot() {
            events.push(StoreEvent::AddedToSlot {
                item: id,
                slot: slot.clone(),
            });
        }

        self.items.insert(record);
        self.events.extend(events);
    }

    /// Moves an item and its attachments out of `source` into this store.
    ///
    /// Ids are preserved. The root leaves its owner and its standalone slot;
    /// attachments keep their links. Fails without touching either store if
    /// any id is already present here.
    pub fn move_item_from(
        &mut self,
        id: ItemId,
        source: &mut ItemsStore,
    ) -> Result<ItemId, StoreError> {
        self.ensure_authority()?;
        source.ensure_authority()?;
        source.require_item(id)?;

        let tree = source.subtree(id);
        if let Some(existing) = tree.iter().find(|id| self.items.contains(**id)) {
            return Err(StoreError::AlreadyExists { item: *existing });
        }
        let definitions = Arc::clone(&self.definitions);
        for member in &tree {
            if let Some(item) = source.items.get(*member) {
                if definitions.definition(item.definition()).is_none() {
                    return Err(StoreError::UnknownDefinition {
                        definition: item.definition().clone(),
                    });
                }
            }
        }

        let records = source.take_tree(id);
        for mut record in records {
            if record.id() == id {
                record.set_slot(None);
                record.detach();
            }
            self.place_record(record);
        }

        info!(from = %source.id, to = %self.id, item = %id, "item moved between stores");
        Ok(id)
    }
}

fn resolve_id(spec: &ItemSpec) -> ItemId {
    if spec.item_id.is_valid() {
        spec.item_id
    } else {
        ItemId::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{STASH, definitions, fixture_store, tag};

    fn stash() -> ItemsStore {
        ItemsStore::authority(STASH, definitions())
    }

    #[test]
    fn copy_container_captures_tree_and_slot() {
        let mut store = fixture_store();
        let rifle = store.add_item(&ItemSpec::new("rifle", 1)).unwrap();
        store.add_item_to_slot(rifle, &tag("Slot.Weapon")).unwrap();

        let container = store.copy_container(rifle).unwrap();

        assert_eq!(container.spec.item_id, rifle);
        assert_eq!(container.slot, Some(tag("Slot.Weapon")));
        assert_eq!(container.attachments.len(), 1);
        assert_eq!(container.attachments[0].attach_slot, tag("Socket.Scope"));
        assert_eq!(container.specs().len(), 2);
    }

    #[test]
    fn container_round_trips_into_empty_store() {
        let mut source = fixture_store();
        let rifle = source.add_item(&ItemSpec::new("rifle", 1)).unwrap();
        source.add_item_to_slot(rifle, &tag("Slot.Weapon")).unwrap();
        let container = source.copy_container(rifle).unwrap();

        let mut restored = stash();
        let ids = restored.add_copy_container(&container).unwrap();

        assert_eq!(ids[0], rifle);
        assert_eq!(ids.len(), 2);
        assert_eq!(
            restored.item_from_slot(&tag("Slot.Weapon")).map(ItemData::id),
            Some(rifle)
        );
        assert_eq!(restored.items_attached_to(rifle).len(), 1);
        assert_eq!(restored.copy_container(rifle), Some(container));
    }

    #[test]
    fn container_with_taken_id_is_refused_without_changes() {
        let mut store = fixture_store();
        let rifle = store.add_item(&ItemSpec::new("rifle", 1)).unwrap();
        let container = store.copy_container(rifle).unwrap();
        let before = store.items_array().digest();

        assert_eq!(
            store.add_copy_container(&container),
            Err(StoreError::AlreadyExists { item: rifle })
        );
        assert_eq!(store.items_array().digest(), before);
    }

    #[test]
    fn move_preserves_ids_and_links() {
        let mut inventory = fixture_store();
        let mut stash = stash();
        let rifle = inventory.add_item(&ItemSpec::new("rifle", 1)).unwrap();
        inventory.add_item_to_slot(rifle, &tag("Slot.Weapon")).unwrap();
        let scope = inventory.items_attached_to(rifle)[0].id();

        let moved = stash.move_item_from(rifle, &mut inventory).unwrap();

        assert_eq!(moved, rifle);
        assert!(inventory.is_empty());
        assert!(inventory.item_from_slot(&tag("Slot.Weapon")).is_none());
        assert!(!stash.is_on_any_slot(rifle));
        assert_eq!(stash.item(scope).unwrap().owner(), Some(rifle));
    }

    #[test]
    fn moving_attachment_detaches_it_from_source_owner() {
        let mut inventory = fixture_store();
        let mut stash = stash();
        let rifle = inventory.add_item(&ItemSpec::new("rifle", 1)).unwrap();
        let scope = inventory.items_attached_to(rifle)[0].id();

        stash.move_item_from(scope, &mut inventory).unwrap();

        assert!(inventory.items_attached_to(rifle).is_empty());
        assert!(!stash.item(scope).unwrap().is_attached());
    }

    #[test]
    fn move_refuses_duplicate_ids() {
        let mut inventory = fixture_store();
        let mut stash = stash();
        let sword = inventory.add_item(&ItemSpec::new("sword", 1)).unwrap();
        stash
            .add_item(&ItemSpec::new("sword", 1).with_item_id(sword))
            .unwrap();

        assert_eq!(
            stash.move_item_from(sword, &mut inventory),
            Err(StoreError::AlreadyExists { item: sword })
        );
        assert!(inventory.item(sword).is_some());
    }
}
