//! Client-side prediction guards.
//!
//! Locks and the pending set mark items and slots that have a command in
//! flight so the UI cannot double-submit. They are advisory, never replicated,
//! and never consulted by the authority. Every acquisition is counted and must
//! be released exactly once.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::warn;

use super::ItemsStore;
use super::events::StoreEvent;
use crate::id::ItemId;
use crate::tag::GameplayTag;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PredictionLocks {
    items: HashMap<ItemId, u32>,
    slots: HashMap<GameplayTag, u32>,
    attachment_slots: HashMap<(ItemId, GameplayTag), u32>,
    pending: HashMap<ItemId, u32>,
}

impl PredictionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is locked or pending.
    pub fn is_clear(&self) -> bool {
        self.items.is_empty()
            && self.slots.is_empty()
            && self.attachment_slots.is_empty()
            && self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.slots.clear();
        self.attachment_slots.clear();
        self.pending.clear();
    }
}

/// Increments a counter; returns true on the 0 → 1 transition.
fn acquire<K: Eq + Hash>(map: &mut HashMap<K, u32>, key: K) -> bool {
    let count = map.entry(key).or_insert(0);
    *count += 1;
    *count == 1
}

/// Decrements a counter; returns `Some(true)` on the 1 → 0 transition and
/// `None` if the key was not held.
fn release<K: Eq + Hash>(map: &mut HashMap<K, u32>, key: &K) -> Option<bool> {
    let count = map.get_mut(key)?;
    *count -= 1;
    if *count == 0 {
        map.remove(key);
        Some(true)
    } else {
        Some(false)
    }
}

impl ItemsStore {
    pub fn lock_item(&mut self, item: ItemId) {
        if self.has_authority() {
            return;
        }
        acquire(&mut self.locks.items, item);
    }

    pub fn unlock_item(&mut self, item: ItemId) {
        if self.has_authority() {
            return;
        }
        if release(&mut self.locks.items, &item).is_none() {
            warn!(store = %self.id, item = %item, "unlock of item that is not locked");
        }
    }

    pub fn is_item_locked(&self, item: ItemId) -> bool {
        !self.has_authority() && self.locks.items.contains_key(&item)
    }

    pub fn lock_slot(&mut self, slot: &GameplayTag) {
        if self.has_authority() {
            return;
        }
        acquire(&mut self.locks.slots, slot.clone());
    }

    pub fn unlock_slot(&mut self, slot: &GameplayTag) {
        if self.has_authority() {
            return;
        }
        if release(&mut self.locks.slots, slot).is_none() {
            warn!(store = %self.id, slot = %slot, "unlock of slot that is not locked");
        }
    }

    pub fn is_slot_locked(&self, slot: &GameplayTag) -> bool {
        !self.has_authority() && self.locks.slots.contains_key(slot)
    }

    pub fn lock_attachment_slot(&mut self, owner: ItemId, slot: &GameplayTag) {
        if self.has_authority() {
            return;
        }
        acquire(&mut self.locks.attachment_slots, (owner, slot.clone()));
    }

    pub fn unlock_attachment_slot(&mut self, owner: ItemId, slot: &GameplayTag) {
        if self.has_authority() {
            return;
        }
        if release(&mut self.locks.attachment_slots, &(owner, slot.clone())).is_none() {
            warn!(
                store = %self.id,
                owner = %owner,
                slot = %slot,
                "unlock of attachment slot that is not locked"
            );
        }
    }

    pub fn is_attachment_slot_locked(&self, owner: ItemId, slot: &GameplayTag) -> bool {
        !self.has_authority()
            && self
                .locks
                .attachment_slots
                .contains_key(&(owner, slot.clone()))
    }

    pub fn add_pending_items(&mut self, items: &[ItemId]) {
        if self.has_authority() {
            return;
        }
        for item in items {
            if acquire(&mut self.locks.pending, *item) {
                self.events.push(StoreEvent::PendingChanged {
                    item: *item,
                    pending: true,
                });
            }
        }
    }

    pub fn remove_pending_items(&mut self, items: &[ItemId]) {
        for item in items {
            self.remove_pending_item(*item);
        }
    }

    pub fn remove_pending_item(&mut self, item: ItemId) {
        if self.has_authority() {
            return;
        }
        match release(&mut self.locks.pending, &item) {
            Some(true) => self.events.push(StoreEvent::PendingChanged {
                item,
                pending: false,
            }),
            Some(false) => {}
            None => warn!(store = %self.id, item = %item, "item was not pending"),
        }
    }

    /// Always false on the authority.
    pub fn is_pending(&self, item: ItemId) -> bool {
        !self.has_authority() && self.locks.pending.contains_key(&item)
    }

    pub fn prediction_locks(&self) -> &PredictionLocks {
        &self.locks
    }

    /// Drops every lock and pending mark, e.g. when the session ends.
    pub fn clear_prediction_locks(&mut self) {
        let pending: Vec<ItemId> = self.locks.pending.keys().copied().collect();
        self.locks.clear();
        for item in pending {
            self.events.push(StoreEvent::PendingChanged {
                item,
                pending: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::test_support::{client_store, fixture_store, tag};

    #[test]
    fn locks_are_counted_per_acquisition() {
        let mut store = client_store();
        let slot = tag("Slot.Weapon");

        store.lock_slot(&slot);
        store.lock_slot(&slot);
        store.unlock_slot(&slot);
        assert!(store.is_slot_locked(&slot));

        store.unlock_slot(&slot);
        assert!(!store.is_slot_locked(&slot));
        assert!(store.prediction_locks().is_clear());
    }

    #[test]
    fn pending_emits_transitions_only() {
        let mut store = client_store();
        let item = crate::ItemId::generate();

        store.add_pending_items(&[item, item]);
        store.remove_pending_item(item);
        assert!(store.is_pending(item));
        store.remove_pending_item(item);
        assert!(!store.is_pending(item));

        let pending_events = store
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, crate::StoreEvent::PendingChanged { .. }))
            .count();
        assert_eq!(pending_events, 2);
    }

    #[test]
    fn authority_ignores_prediction_state() {
        let mut store = fixture_store();
        let item = crate::ItemId::generate();
        let slot = tag("Slot.Weapon");

        store.add_pending_items(&[item]);
        store.lock_item(item);
        store.lock_slot(&slot);
        store.lock_attachment_slot(item, &slot);

        assert!(!store.is_pending(item));
        assert!(!store.is_item_locked(item));
        assert!(!store.is_slot_locked(&slot));
        assert!(!store.is_attachment_slot_locked(item, &slot));
        assert!(store.prediction_locks().is_clear());
    }

    #[test]
    fn attachment_slot_locks_are_keyed_by_owner() {
        let mut store = client_store();
        let owner = crate::ItemId::generate();
        let other = crate::ItemId::generate();
        let scope = tag("Socket.Scope");

        store.lock_attachment_slot(owner, &scope);
        assert!(store.is_attachment_slot_locked(owner, &scope));
        assert!(!store.is_attachment_slot_locked(other, &scope));

        store.unlock_attachment_slot(owner, &scope);
        assert!(!store.is_attachment_slot_locked(owner, &scope));
    }
}
