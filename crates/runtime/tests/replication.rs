//! End-to-end command flow between an authority and connected client sessions.

mod common;

use common::{INVENTORY, STASH, builder, tag};
use items_core::{
    AttachItem, CommandError, CommandOutcome, DropItem, EquipItem, EquipNewItem, ItemId,
    ItemSpec, ItemsStores, MoveItemBetweenStores, MoveItemToSlot, ReplicatedCommand, StoreId,
    TaggedCommand,
};
use serde::{Deserialize, Serialize};

use items_runtime::{
    ClientSession, CommandEvent, CommandRegistry, Event, Origin, RuntimeHandle, StoreChange, Topic,
};

async fn assert_converged(handle: &RuntimeHandle, session: &mut ClientSession) {
    session.poll().unwrap();
    for store in [INVENTORY, STASH] {
        assert_eq!(
            session.store(store).unwrap().items_array().digest(),
            handle.digest(store).await.unwrap(),
            "store {store} diverged"
        );
        assert!(session.store(store).unwrap().prediction_locks().is_clear());
    }
}

#[tokio::test]
async fn equip_sword_through_the_authority() {
    let runtime = builder().build().await.unwrap();
    let handle = runtime.handle();
    let sword = handle
        .grant_item(INVENTORY, ItemSpec::new("sword", 1))
        .await
        .unwrap();

    let mut session = runtime.connect().await.unwrap();
    assert!(session.store(INVENTORY).unwrap().item(sword).is_some());

    let weapon = tag("Slot.Weapon");
    let id = session
        .send(EquipItem::new(INVENTORY, sword, weapon.clone()))
        .await
        .unwrap();
    assert!(session.store(INVENTORY).unwrap().is_pending(sword));

    let confirmation = session.wait_for(id).await.unwrap();
    assert!(confirmation.success, "{confirmation:?}");
    assert_eq!(confirmation.outcome, CommandOutcome::Item(sword));

    let replica = session.store(INVENTORY).unwrap();
    assert_eq!(replica.item_from_slot(&weapon).map(|i| i.id()), Some(sword));
    assert!(!replica.is_pending(sword));
    assert_converged(&handle, &mut session).await;

    drop(handle);
    session.shutdown();
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn racing_commands_second_is_rejected_as_stale() {
    let runtime = builder().build().await.unwrap();
    let handle = runtime.handle();
    let potion = handle
        .grant_item(INVENTORY, ItemSpec::new("potion", 5))
        .await
        .unwrap();

    let mut first = runtime.connect().await.unwrap();
    let mut second = runtime.connect().await.unwrap();

    // Both predict against version 1 of the potion.
    let drop_one = first
        .send(DropItem::new(INVENTORY, potion, 1))
        .await
        .unwrap();
    let move_all = second
        .send(MoveItemBetweenStores::whole(INVENTORY, STASH, potion))
        .await
        .unwrap();

    let dropped = first.wait_for(drop_one).await.unwrap();
    assert!(dropped.success);
    assert!(matches!(dropped.outcome, CommandOutcome::Dropped(ref spec) if spec.amount == 1));

    let moved = second.wait_for(move_all).await.unwrap();
    assert!(!moved.success);
    assert!(moved.error.unwrap().contains("changed since the command was sent"));

    // The loser sees the winner's result and holds no locks.
    second.poll().unwrap();
    let replica = second.store(INVENTORY).unwrap();
    assert_eq!(replica.item(potion).unwrap().stacks(), 4);
    assert!(second.store(STASH).unwrap().is_empty());

    assert_converged(&handle, &mut first).await;
    assert_converged(&handle, &mut second).await;
}

#[tokio::test]
async fn moves_and_attachments_replicate_to_every_client() {
    let runtime = builder().build().await.unwrap();
    let handle = runtime.handle();
    let arrows = handle
        .grant_item(INVENTORY, ItemSpec::new("arrow", 5))
        .await
        .unwrap();
    let rifle = handle
        .grant_item(STASH, ItemSpec::new("rifle", 1))
        .await
        .unwrap();

    let mut actor = runtime.connect().await.unwrap();
    let mut observer = runtime.connect().await.unwrap();

    // The rifle arrived with its default scope attached.
    let scope = actor
        .store(STASH)
        .unwrap()
        .find_attached_item_on_slot(rifle, &tag("Socket.Scope"))
        .map(|item| item.id())
        .unwrap();

    let split = actor
        .send(MoveItemBetweenStores::new(INVENTORY, STASH, arrows, 2))
        .await
        .unwrap();
    assert!(actor.wait_for(split).await.unwrap().success);

    let equip = actor
        .send(MoveItemToSlot::new(STASH, INVENTORY, rifle, tag("Slot.Weapon")))
        .await
        .unwrap();
    let confirmation = actor.wait_for(equip).await.unwrap();
    assert!(confirmation.success, "{confirmation:?}");

    observer.poll().unwrap();
    let inventory = observer.store(INVENTORY).unwrap();
    assert_eq!(inventory.item(arrows).unwrap().stacks(), 3);
    assert_eq!(
        inventory.item_from_slot(&tag("Slot.Weapon")).map(|i| i.id()),
        Some(rifle)
    );
    assert_eq!(inventory.item(scope).unwrap().owner(), Some(rifle));
    assert_eq!(
        observer
            .store(STASH)
            .unwrap()
            .count_items_by_definition(&"arrow".into()),
        2
    );

    assert_converged(&handle, &mut actor).await;
    assert_converged(&handle, &mut observer).await;
}

#[tokio::test]
async fn invalid_attach_is_refused_without_changes() {
    let runtime = builder().build().await.unwrap();
    let handle = runtime.handle();
    let sword = handle
        .grant_item(INVENTORY, ItemSpec::new("sword", 1))
        .await
        .unwrap();
    let shield = handle
        .grant_item(INVENTORY, ItemSpec::new("shield", 1))
        .await
        .unwrap();
    let before = handle.digest(INVENTORY).await.unwrap();

    let mut session = runtime.connect().await.unwrap();
    let result = session
        .send(AttachItem::new(INVENTORY, sword, shield, tag("Socket.Scope")))
        .await;

    assert!(result.is_err());
    assert_eq!(session.in_flight(), 0);
    assert_eq!(handle.digest(INVENTORY).await.unwrap(), before);
    assert_converged(&handle, &mut session).await;
}

#[tokio::test]
async fn unregistered_command_kind_is_refused() {
    let mut registry = CommandRegistry::new();
    registry.register::<EquipItem>();
    let runtime = builder().registry(registry).build().await.unwrap();
    let handle = runtime.handle();
    let potion = handle
        .grant_item(INVENTORY, ItemSpec::new("potion", 2))
        .await
        .unwrap();
    let mut commands = handle.subscribe(Topic::Command);

    let mut session = runtime.connect().await.unwrap();
    let id = session
        .send(DropItem::all(INVENTORY, potion))
        .await
        .unwrap();
    let confirmation = session.wait_for(id).await.unwrap();

    assert!(!confirmation.success);
    assert!(confirmation.error.unwrap().contains("drop_item"));
    assert_converged(&handle, &mut session).await;

    let mut rejected = false;
    while let Ok(event) = commands.try_recv() {
        rejected |= matches!(
            event,
            Event::Command(CommandEvent::Rejected { ref tag, .. }) if tag == "drop_item"
        );
    }
    assert!(rejected);
}

#[tokio::test]
async fn store_events_are_published_for_both_roles() {
    let runtime = builder().build().await.unwrap();
    let handle = runtime.handle();
    let mut store_events = handle.subscribe(Topic::Store);

    let mut session = runtime.connect().await.unwrap();
    let id = session
        .send(EquipNewItem::new(
            INVENTORY,
            "shield",
            tag("Slot.Offhand"),
            false,
        ))
        .await
        .unwrap();
    let confirmation = session.wait_for(id).await.unwrap();
    let CommandOutcome::Item(shield) = confirmation.outcome else {
        panic!("expected the new shield, got {confirmation:?}");
    };

    let mut authority_slotted = false;
    let mut replica_slotted = false;
    while let Ok(Event::Store(StoreChange { origin, event, .. })) = store_events.try_recv() {
        let slotted = matches!(
            event,
            items_core::StoreEvent::AddedToSlot { item, .. } if item == shield
        );
        match origin {
            Origin::Authority => authority_slotted |= slotted,
            Origin::Client(_) => replica_slotted |= slotted,
        }
    }
    assert!(authority_slotted);
    assert!(replica_slotted);
}

/// Grants a potion on the authority, then fails.
#[derive(Debug, Serialize, Deserialize)]
struct GrantThenFail {
    store: StoreId,
    item: ItemId,
}

impl TaggedCommand for GrantThenFail {
    const TAG: &'static str = "grant_then_fail";
}

impl ReplicatedCommand for GrantThenFail {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn can_send_command(&self, _stores: &ItemsStores) -> Result<(), CommandError> {
        Ok(())
    }

    fn pre_send_command(&mut self, _stores: &mut ItemsStores) {}

    fn execute(&self, stores: &mut ItemsStores) -> Result<CommandOutcome, CommandError> {
        if let Some(store) = stores.get_mut(self.store) {
            let _ = store.add_item(&ItemSpec::new("potion", 3));
        }
        Err(CommandError::NotDroppable { item: self.item })
    }

    fn command_confirmed(&mut self, _stores: &mut ItemsStores, _success: bool) {}
}

#[tokio::test]
async fn failed_command_leaves_no_partial_effects() {
    let mut registry = CommandRegistry::with_builtin_commands();
    registry.register::<GrantThenFail>();
    let runtime = builder().registry(registry).build().await.unwrap();
    let handle = runtime.handle();
    let sword = handle
        .grant_item(INVENTORY, ItemSpec::new("sword", 1))
        .await
        .unwrap();
    let before = handle.digest(INVENTORY).await.unwrap();

    let mut session = runtime.connect().await.unwrap();
    let id = session
        .send(GrantThenFail {
            store: INVENTORY,
            item: sword,
        })
        .await
        .unwrap();
    let confirmation = session.wait_for(id).await.unwrap();

    assert!(!confirmation.success);
    assert_eq!(handle.digest(INVENTORY).await.unwrap(), before);
    let snapshot = handle.snapshot(INVENTORY).await.unwrap();
    assert_eq!(snapshot.record_count(), 1);
    assert_converged(&handle, &mut session).await;
    assert_eq!(
        session
            .store(INVENTORY)
            .unwrap()
            .count_items_by_definition(&"potion".into()),
        0
    );
}
