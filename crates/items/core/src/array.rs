//! Replicated, indexed collection of item records.
//!
//! [`ItemsArray`] is an arena: records live in slots, a free list recycles
//! slots, and a hash index maps [`ItemId`] to slot. Ids are GUIDs and never
//! reused, so a stale id cannot alias a newer record.
//!
//! Replication is per record. Every mutation stamps the record with a fresh,
//! array-wide replication key; removals leave a tombstone stamped the same way.
//! [`ItemsArray::delta_since`] collects everything stamped after a peer's last
//! acknowledged key, and [`ItemsArray::apply_delta`] folds such a delta into a
//! replica.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::data::ItemData;
use crate::definition::DefinitionId;
use crate::error::{ErrorSeverity, ItemsError};
use crate::id::ItemId;
use crate::spec::ItemSpec;
use crate::tag::GameplayTag;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    item: ItemData,
    replication_key: u64,
}

/// Records changed between two replication keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemsDelta {
    /// Key the receiver must already have applied.
    pub from_key: u64,
    /// Key the receiver holds after applying this delta.
    pub to_key: u64,
    /// Replace the receiver's contents instead of patching them.
    pub full: bool,
    /// Added or changed records, with their versions.
    pub upserts: Vec<ItemData>,
    pub removals: Vec<ItemId>,
    /// Logical record count on the sender after this delta.
    pub item_num: u32,
}

impl ItemsDelta {
    pub fn is_empty(&self) -> bool {
        !self.full && self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Per-record notification produced while applying a delta to a replica.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationNotify {
    Added(ItemId),
    Changed { id: ItemId, version: u32 },
    Removed(ItemId),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReplicationError {
    #[error("delta starts at key {from_key} but replica is at key {applied_key}")]
    Gap { from_key: u64, applied_key: u64 },
}

impl ItemsError for ReplicationError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Recoverable
    }

    fn error_code(&self) -> &'static str {
        "REPLICATION_GAP"
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemsArray {
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
    index: HashMap<ItemId, usize>,
    /// Last key handed out by this array.
    key: u64,
    tombstones: Vec<(u64, ItemId)>,
    /// Tombstones at or below this key have been discarded.
    compacted_key: u64,
    /// Last delta key folded in when this array is a replica.
    applied_key: u64,
}

impl ItemsArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemData> {
        let slot = *self.index.get(&id)?;
        self.entries
            .get(slot)
            .and_then(Option::as_ref)
            .map(|entry| &entry.item)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemData> {
        self.entries.iter().flatten().map(|entry| &entry.item)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Logical record count mirrored to replicas.
    pub fn item_num(&self) -> u32 {
        self.index.len() as u32
    }

    /// Current replication key.
    pub fn replication_key(&self) -> u64 {
        self.key
    }

    /// Last delta key applied on a replica.
    pub fn applied_key(&self) -> u64 {
        self.applied_key
    }

    pub fn item_from_slot(&self, slot: &GameplayTag) -> Option<&ItemData> {
        self.iter().find(|item| item.slot() == Some(slot))
    }

    pub fn items_attached_to(&self, owner: ItemId) -> Vec<&ItemData> {
        self.iter().filter(|item| item.owner() == Some(owner)).collect()
    }

    pub fn items_on_slots(&self) -> Vec<&ItemData> {
        self.iter().filter(|item| item.slot().is_some()).collect()
    }

    pub fn find_by_definition(&self, definition: &DefinitionId) -> Option<&ItemData> {
        self.iter().find(|item| item.definition() == definition)
    }

    // ===== mutation (crate-internal; the store is the only writer) =====

    pub(crate) fn add(&mut self, id: ItemId, spec: &ItemSpec) -> ItemId {
        self.insert(ItemData::from_spec(id, spec));
        id
    }

    /// Inserts a record built elsewhere, bumping its version.
    pub(crate) fn insert(&mut self, mut item: ItemData) {
        let id = item.id();
        if self.index.contains_key(&id) {
            warn!(item = %id, "replacing record with duplicate id");
            self.remove(id);
        }

        item.bump_version();
        let key = self.next_key();
        let entry = Entry {
            item,
            replication_key: key,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Option<ItemData> {
        let slot = self.index.remove(&id)?;
        let entry = self.entries.get_mut(slot)?.take()?;
        self.free.push(slot);

        let key = self.next_key();
        self.tombstones.push((key, id));
        Some(entry.item)
    }

    /// Mutates a record in place, bumping its version and replication key.
    pub(crate) fn modify<R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut ItemData) -> R,
    ) -> Option<R> {
        let slot = *self.index.get(&id)?;
        let key = self.next_key();
        let entry = self.entries.get_mut(slot)?.as_mut()?;

        let result = f(&mut entry.item);
        entry.item.bump_version();
        entry.replication_key = key;
        Some(result)
    }

    fn next_key(&mut self) -> u64 {
        self.key += 1;
        self.key
    }

    // ===== replication =====

    /// Collects every change stamped after `from_key`.
    ///
    /// Falls back to a full snapshot when the tombstones a peer would need
    /// have already been compacted away.
    pub fn delta_since(&self, from_key: u64) -> ItemsDelta {
        if from_key < self.compacted_key {
            return self.full_delta(from_key);
        }

        let upserts = self
            .entries
            .iter()
            .flatten()
            .filter(|entry| entry.replication_key > from_key)
            .map(|entry| entry.item.clone())
            .collect();

        let removals = self
            .tombstones
            .iter()
            .filter(|(key, _)| *key > from_key)
            .map(|(_, id)| *id)
            .collect();

        ItemsDelta {
            from_key,
            to_key: self.key,
            full: false,
            upserts,
            removals,
            item_num: self.item_num(),
        }
    }

    pub fn full_delta(&self, from_key: u64) -> ItemsDelta {
        ItemsDelta {
            from_key,
            to_key: self.key,
            full: true,
            upserts: self.iter().cloned().collect(),
            removals: Vec::new(),
            item_num: self.item_num(),
        }
    }

    /// Drops tombstones every peer has acknowledged.
    pub fn compact_tombstones(&mut self, acked_key: u64) {
        let acked_key = acked_key.min(self.key);
        self.tombstones.retain(|(key, _)| *key > acked_key);
        self.compacted_key = self.compacted_key.max(acked_key);
    }

    /// Folds an authority delta into this replica.
    ///
    /// Upserts whose version is older than the local record are ignored, so a
    /// late delta can never roll a record back.
    pub fn apply_delta(
        &mut self,
        delta: &ItemsDelta,
    ) -> Result<Vec<ReplicationNotify>, ReplicationError> {
        if !delta.full && delta.from_key > self.applied_key {
            return Err(ReplicationError::Gap {
                from_key: delta.from_key,
                applied_key: self.applied_key,
            });
        }

        let mut notifications = Vec::new();

        if delta.full {
            let keep: HashSet<ItemId> = delta.upserts.iter().map(ItemData::id).collect();
            let stale: Vec<ItemId> = self
                .index
                .keys()
                .copied()
                .filter(|id| !keep.contains(id))
                .collect();
            for id in stale {
                self.remove(id);
                notifications.push(ReplicationNotify::Removed(id));
            }
        }

        for id in &delta.removals {
            if self.remove(*id).is_some() {
                notifications.push(ReplicationNotify::Removed(*id));
            }
        }

        for incoming in &delta.upserts {
            notifications.extend(self.apply_upsert(incoming));
        }

        if delta.item_num != self.item_num() {
            debug!(
                expected = delta.item_num,
                actual = self.item_num(),
                "replica item count differs after delta"
            );
        }

        self.applied_key = self.applied_key.max(delta.to_key);
        // Replicas never serve deltas of their own.
        self.compact_tombstones(self.key);
        Ok(notifications)
    }

    fn apply_upsert(&mut self, incoming: &ItemData) -> Option<ReplicationNotify> {
        let id = incoming.id();
        let Some(&slot) = self.index.get(&id) else {
            self.place(incoming.clone());
            return Some(ReplicationNotify::Added(id));
        };

        let key = self.next_key();
        let entry = self.entries.get_mut(slot)?.as_mut()?;
        if entry.item.version() > incoming.version() || entry.item == *incoming {
            return None;
        }

        entry.item = incoming.clone();
        entry.replication_key = key;
        Some(ReplicationNotify::Changed {
            id,
            version: incoming.version(),
        })
    }

    /// Stores a replicated record verbatim, keeping its authority version.
    fn place(&mut self, item: ItemData) {
        let id = item.id();
        let key = self.next_key();
        let entry = Entry {
            item,
            replication_key: key,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    /// SHA-256 over all records in id order.
    ///
    /// Two arrays holding the same records at the same versions produce the
    /// same digest regardless of arena layout or replication keys.
    pub fn digest(&self) -> [u8; 32] {
        let mut items: Vec<&ItemData> = self.iter().collect();
        items.sort_by_key(|item| item.id());

        let mut hasher = Sha256::new();
        for item in items {
            for word in item.id().to_words() {
                hasher.update(word.to_le_bytes());
            }
            hash_str(&mut hasher, item.definition().as_str());
            hasher.update(item.version().to_le_bytes());
            hasher.update(item.stacks().to_le_bytes());
            hasher.update([item.level()]);
            hash_str(&mut hasher, item.slot().map_or("", GameplayTag::as_str));
            for word in item.owner().unwrap_or(ItemId::INVALID).to_words() {
                hasher.update(word.to_le_bytes());
            }
            hash_str(&mut hasher, item.attach_slot().map_or("", GameplayTag::as_str));
            for tag in item.dynamic_tags().iter() {
                hash_str(&mut hasher, tag.as_str());
            }
            for (stat, value) in item.stat_overrides() {
                hash_str(&mut hasher, stat);
                hasher.update(value.to_le_bytes());
            }
        }
        hasher.finalize().into()
    }
}

fn hash_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u32).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> GameplayTag {
        GameplayTag::new(name).unwrap()
    }

    #[test]
    fn removed_ids_never_resolve_even_after_slot_reuse() {
        let mut items = ItemsArray::new();
        let first = items.add(ItemId::generate(), &ItemSpec::new("sword", 1));
        items.remove(first);

        let second = items.add(ItemId::generate(), &ItemSpec::new("axe", 1));

        assert!(items.get(first).is_none());
        assert_eq!(items.get(second).unwrap().definition().as_str(), "axe");
        assert_eq!(items.item_num(), 1);
    }

    #[test]
    fn every_mutation_bumps_version() {
        let mut items = ItemsArray::new();
        let id = items.add(ItemId::generate(), &ItemSpec::new("potion", 2));
        assert_eq!(items.get(id).unwrap().version(), 1);

        items.modify(id, |item| item.set_stacks(1));
        items.modify(id, |item| item.set_slot(Some(slot("Slot.Belt"))));

        let item = items.get(id).unwrap();
        assert_eq!(item.version(), 3);
        assert_eq!(item.stacks(), 1);
    }

    #[test]
    fn delta_carries_changes_after_key_only() {
        let mut items = ItemsArray::new();
        let a = items.add(ItemId::generate(), &ItemSpec::new("sword", 1));
        let b = items.add(ItemId::generate(), &ItemSpec::new("shield", 1));
        let acked = items.replication_key();

        items.modify(a, |item| item.set_stacks(2));
        items.remove(b);

        let delta = items.delta_since(acked);
        assert!(!delta.full);
        assert_eq!(delta.upserts.len(), 1);
        assert_eq!(delta.upserts[0].id(), a);
        assert_eq!(delta.upserts[0].version(), 2);
        assert_eq!(delta.removals, vec![b]);
        assert_eq!(delta.item_num, 1);
    }

    #[test]
    fn replica_converges_through_deltas() {
        let mut authority = ItemsArray::new();
        let mut replica = ItemsArray::new();

        let a = authority.add(ItemId::generate(), &ItemSpec::new("sword", 1));
        let b = authority.add(ItemId::generate(), &ItemSpec::new("arrow", 20));
        let notes = replica
            .apply_delta(&authority.delta_since(replica.applied_key()))
            .unwrap();
        assert_eq!(notes.len(), 2);

        authority.modify(a, |item| item.set_slot(Some(slot("Slot.Weapon"))));
        authority.remove(b);
        let notes = replica
            .apply_delta(&authority.delta_since(replica.applied_key()))
            .unwrap();

        assert!(notes.contains(&ReplicationNotify::Removed(b)));
        assert!(notes.contains(&ReplicationNotify::Changed { id: a, version: 2 }));
        assert_eq!(replica.digest(), authority.digest());
        assert_eq!(
            replica.item_from_slot(&slot("Slot.Weapon")).map(ItemData::id),
            Some(a)
        );
    }

    #[test]
    fn stale_upsert_does_not_roll_back_replica() {
        let mut authority = ItemsArray::new();
        let mut replica = ItemsArray::new();
        let id = authority.add(ItemId::generate(), &ItemSpec::new("potion", 3));
        let old = authority.delta_since(0);

        authority.modify(id, |item| item.set_stacks(1));
        replica.apply_delta(&authority.delta_since(0)).unwrap();
        let notes = replica.apply_delta(&old).unwrap();

        assert!(notes.is_empty());
        assert_eq!(replica.get(id).unwrap().stacks(), 1);
    }

    #[test]
    fn gap_is_reported_and_compaction_forces_full_resync() {
        let mut authority = ItemsArray::new();
        let mut replica = ItemsArray::new();
        let a = authority.add(ItemId::generate(), &ItemSpec::new("sword", 1));
        let from = authority.replication_key();
        authority.add(ItemId::generate(), &ItemSpec::new("shield", 1));

        assert_eq!(
            replica.apply_delta(&authority.delta_since(from)),
            Err(ReplicationError::Gap {
                from_key: from,
                applied_key: 0
            })
        );

        authority.remove(a);
        authority.compact_tombstones(authority.replication_key());
        let delta = authority.delta_since(0);
        assert!(delta.full);

        replica.apply_delta(&delta).unwrap();
        assert_eq!(replica.digest(), authority.digest());
        assert!(replica.get(a).is_none());
    }

    #[test]
    fn digest_ignores_arena_layout() {
        let id_a = ItemId::generate();
        let id_b = ItemId::generate();

        let mut left = ItemsArray::new();
        left.add(id_a, &ItemSpec::new("sword", 1));
        left.add(id_b, &ItemSpec::new("shield", 1));

        let mut right = ItemsArray::new();
        right.add(id_b, &ItemSpec::new("shield", 1));
        right.add(id_a, &ItemSpec::new("sword", 1));

        assert_eq!(hex::encode(left.digest()), hex::encode(right.digest()));
    }
}
