//! Attachment graph: items attached to sockets declared by other items.
//!
//! The graph is a forest. Each attachment records its owner and attach slot,
//! an owner's socket holds at most one attachment, and chains never loop or
//! grow past [`StoreConfig::MAX_ATTACHMENT_DEPTH`].

use tracing::{debug, info};

use super::{ItemsStore, StoreError, StoreEvent};
use crate::config::StoreConfig;
use crate::data::ItemData;
use crate::definition::DefinitionId;
use crate::id::ItemId;
use crate::spec::ItemSpec;
use crate::tag::GameplayTag;

impl ItemsStore {
    pub fn items_attached_to(&self, owner: ItemId) -> Vec<&ItemData> {
        self.items.items_attached_to(owner)
    }

    pub fn find_attached_item_on_slot(
        &self,
        owner: ItemId,
        slot: &GameplayTag,
    ) -> Option<&ItemData> {
        self.items
            .iter()
            .find(|item| item.owner() == Some(owner) && item.attach_slot() == Some(slot))
    }

    /// Number of owners above `id` (0 for a root item).
    pub fn attachment_depth(&self, id: ItemId) -> usize {
        let mut depth = 0;
        let mut cursor = self.items.get(id).and_then(ItemData::owner);
        while let Some(owner) = cursor {
            depth += 1;
            if depth > StoreConfig::MAX_ATTACHMENT_DEPTH {
                break;
            }
            cursor = self.items.get(owner).and_then(ItemData::owner);
        }
        depth
    }

    /// Longest chain of attachments hanging below `id`.
    fn attachment_height(&self, id: ItemId) -> usize {
        let mut frontier = vec![id];
        let mut height = 0;
        while height <= StoreConfig::MAX_ATTACHMENT_DEPTH {
            let next: Vec<ItemId> = frontier
                .iter()
                .flat_map(|parent| self.items.items_attached_to(*parent))
                .map(ItemData::id)
                .collect();
            if next.is_empty() {
                break;
            }
            frontier = next;
            height += 1;
        }
        height
    }

    /// Checks that `attachment` (or a new item when `None`) may go on
    /// `owner`'s `slot`.
    pub(crate) fn check_attach_target(
        &self,
        owner: ItemId,
        slot: &GameplayTag,
        attachment: Option<ItemId>,
    ) -> Result<(), StoreError> {
        let declared = self
            .definition_of(owner)
            .map(|definition| definition.declares_socket(slot));
        match declared {
            None => return Err(StoreError::ItemNotFound { item: owner }),
            Some(false) => {
                return Err(StoreError::SocketNotDeclared {
                    owner,
                    slot: slot.clone(),
                });
            }
            Some(true) => {}
        }

        if let Some(occupant) = self.find_attached_item_on_slot(owner, slot) {
            if Some(occupant.id()) != attachment {
                return Err(StoreError::AttachmentSlotOccupied {
                    owner,
                    slot: slot.clone(),
                    occupant: occupant.id(),
                });
            }
        }

        let height = match attachment {
            Some(attachment) => {
                if attachment == owner || self.subtree(attachment).contains(&owner) {
                    return Err(StoreError::AttachmentCycle { owner, attachment });
                }
                self.attachment_height(attachment)
            }
            None => 0,
        };

        if self.attachment_depth(owner) + 1 + height > StoreConfig::MAX_ATTACHMENT_DEPTH {
            return Err(StoreError::AttachmentTooDeep {
                owner,
                max_depth: StoreConfig::MAX_ATTACHMENT_DEPTH,
            });
        }
        Ok(())
    }

    /// Attaches an existing item to `owner`'s socket.
    ///
    /// The attachment leaves its standalone slot and any previous owner.
    pub fn attach_to_item(
        &mut self,
        owner: ItemId,
        attachment: ItemId,
        slot: &GameplayTag,
    ) -> Result<(), StoreError> {
        self.ensure_authority()?;
        let item = self.require_item(attachment)?;
        if item.owner() == Some(owner) && item.attach_slot() == Some(slot) {
            return Ok(());
        }
        let previous_slot = item.slot().cloned();
        let previous_owner = item.owner().zip(item.attach_slot().cloned());
        self.check_attach_target(owner, slot, Some(attachment))?;

        self.items.modify(attachment, |item| {
            item.set_slot(None);
            item.attach_to(owner, slot.clone());
        });

        if let Some(previous) = previous_slot {
            self.events.push(StoreEvent::RemovedFromSlot {
                item: attachment,
                slot: previous,
            });
        }
        if let Some((previous, previous_attach_slot)) = previous_owner {
            self.events.push(StoreEvent::Detached {
                owner: previous,
                attachment,
                slot: previous_attach_slot,
            });
        }
        self.events.push(StoreEvent::Attached {
            owner,
            attachment,
            slot: slot.clone(),
        });
        info!(store = %self.id, %owner, %attachment, slot = %slot, "item attached");
        Ok(())
    }

    /// Creates a single new item of `definition` directly on `owner`'s socket.
    pub fn attach_new_to_item(
        &mut self,
        owner: ItemId,
        definition: &DefinitionId,
        slot: &GameplayTag,
    ) -> Result<ItemId, StoreError> {
        self.add_item_attached(&ItemSpec::new(definition.clone(), 1), owner, slot)
    }

    /// Adds an item straight onto `owner`'s socket, bypassing stack merging.
    pub fn add_item_attached(
        &mut self,
        spec: &ItemSpec,
        owner: ItemId,
        slot: &GameplayTag,
    ) -> Result<ItemId, StoreError> {
        self.add_record(spec, Some((owner, slot.clone())), false)
    }

    /// Detaches an item from its owner; returns the former owner.
    pub fn detach_item_from(&mut self, attachment: ItemId) -> Result<ItemId, StoreError> {
        self.ensure_authority()?;
        let item = self.require_item(attachment)?;
        let (owner, slot) = item
            .owner()
            .zip(item.attach_slot().cloned())
            .ok_or(StoreError::NotAttached { item: attachment })?;

        self.items.modify(attachment, ItemData::detach);
        self.events.push(StoreEvent::Detached {
            owner,
            attachment,
            slot,
        });
        debug!(store = %self.id, %owner, %attachment, "item detached");
        Ok(owner)
    }

    /// Detaches whatever sits on `owner`'s socket; returns the attachment.
    pub fn detach_item_from_slot(
        &mut self,
        owner: ItemId,
        slot: &GameplayTag,
    ) -> Result<ItemId, StoreError> {
        self.ensure_authority()?;
        self.require_item(owner)?;
        let attachment = self
            .find_attached_item_on_slot(owner, slot)
            .map(ItemData::id)
            .ok_or_else(|| StoreError::NothingAttached {
                owner,
                slot: slot.clone(),
            })?;

        self.detach_item_from(attachment)?;
        Ok(attachment)
    }
}
