//! Scripted session: one authority, two clients, a handful of commands.
use anyhow::{Context, Result, bail};
use tokio::sync::broadcast;
use tracing::{info, warn};

use items_core::{
    AttachItem, DetachItem, DropItem, EquipItem, GameplayTag, ItemId, ItemSpec,
    MoveItemBetweenStores, MoveItemToSlot, RemoveItemFromSlot, ReplicatedCommand, StoreId,
};
use items_runtime::{ClientSession, CommandEvent, Event, Runtime, RuntimeHandle, Topic};
use serde::Serialize;

pub const INVENTORY: StoreId = StoreId(1);
pub const STASH: StoreId = StoreId(2);

fn tag(name: &str) -> Result<GameplayTag> {
    GameplayTag::new(name).with_context(|| format!("invalid tag {name}"))
}

/// Send `command` and wait for the authority's verdict.
async fn submit<C>(session: &mut ClientSession, label: &str, command: C) -> Result<bool>
where
    C: ReplicatedCommand + Serialize + 'static,
{
    let id = match session.send(command).await {
        Ok(id) => id,
        Err(e) => {
            warn!(client = %session.id(), label, error = %e, "refused locally");
            return Ok(false);
        }
    };

    let confirmation = session.wait_for(id).await?;
    if confirmation.success {
        info!(client = %session.id(), label, outcome = ?confirmation.outcome, "confirmed");
    } else {
        warn!(
            client = %session.id(),
            label,
            error = confirmation.error.as_deref().unwrap_or("unknown"),
            "rejected"
        );
    }
    Ok(confirmation.success)
}

struct Granted {
    sword: ItemId,
    potion: ItemId,
    arrows: ItemId,
    rifle: ItemId,
}

async fn grant_starting_items(handle: &RuntimeHandle) -> Result<Granted> {
    let sword = handle.grant_item(INVENTORY, ItemSpec::new("sword", 1)).await?;
    handle.grant_item(INVENTORY, ItemSpec::new("shield", 1)).await?;
    let potion = handle.grant_item(INVENTORY, ItemSpec::new("potion", 6)).await?;
    // Five per record; the remainder lands in a second record.
    let arrows = handle.grant_item(INVENTORY, ItemSpec::new("arrow", 8)).await?;
    let rifle = handle.grant_item(STASH, ItemSpec::new("rifle", 1)).await?;

    Ok(Granted {
        sword,
        potion,
        arrows,
        rifle,
    })
}

async fn ensure_converged(handle: &RuntimeHandle, session: &mut ClientSession) -> Result<()> {
    session.poll()?;
    for store in [INVENTORY, STASH] {
        let replica = session
            .store(store)
            .with_context(|| format!("{} has no replica of {store}", session.id()))?;
        let authority = handle.digest(store).await?;
        if replica.items_array().digest() != authority {
            bail!("{} diverged from the authority on {store}", session.id());
        }
    }
    info!(client = %session.id(), "replicas match the authority");
    Ok(())
}

/// Run the scripted session against `runtime`.
///
/// Returns the number of command lifecycle events observed.
pub async fn run(runtime: &Runtime, persist: bool) -> Result<usize> {
    let handle = runtime.handle();
    let mut command_events = handle.subscribe(Topic::Command);

    let restored = handle.snapshot(INVENTORY).await?.record_count()
        + handle.snapshot(STASH).await?.record_count();
    if restored > 0 {
        info!(records = restored, "continuing from saved stores");
    }

    let items = grant_starting_items(&handle).await?;
    let mut alice = runtime.connect().await?;
    let mut bob = runtime.connect().await?;
    info!(alice = %alice.id(), bob = %bob.id(), "clients connected");

    let weapon = tag("Slot.Weapon")?;
    let back = tag("Slot.Back")?;
    let scope_socket = tag("Socket.Scope")?;

    submit(
        &mut alice,
        "equip sword",
        EquipItem::new(INVENTORY, items.sword, weapon.clone()),
    )
    .await?;
    submit(
        &mut alice,
        "stash two arrows",
        MoveItemBetweenStores::new(INVENTORY, STASH, items.arrows, 2),
    )
    .await?;
    submit(
        &mut alice,
        "sling rifle",
        MoveItemToSlot::new(STASH, INVENTORY, items.rifle, back),
    )
    .await?;

    let scope = alice
        .store(INVENTORY)
        .and_then(|store| store.find_attached_item_on_slot(items.rifle, &scope_socket))
        .map(|item| item.id());
    submit(
        &mut alice,
        "detach scope",
        DetachItem::new(INVENTORY, items.rifle, scope_socket.clone()),
    )
    .await?;
    if let Some(scope) = scope {
        submit(
            &mut alice,
            "reattach scope",
            AttachItem::new(INVENTORY, items.rifle, scope, scope_socket),
        )
        .await?;
    }

    // Both clients predict against the same potion version; the later
    // submission is refused as stale.
    bob.poll()?;
    let drop_one = alice.send(DropItem::new(INVENTORY, items.potion, 1)).await?;
    let move_all = bob
        .send(MoveItemBetweenStores::whole(INVENTORY, STASH, items.potion))
        .await?;
    let dropped = alice.wait_for(drop_one).await?;
    let moved = bob.wait_for(move_all).await?;
    info!(
        drop_succeeded = dropped.success,
        move_succeeded = moved.success,
        move_error = moved.error.as_deref().unwrap_or(""),
        "race resolved"
    );

    submit(
        &mut bob,
        "unequip sword to stash",
        RemoveItemFromSlot::new(INVENTORY, STASH, weapon),
    )
    .await?;

    ensure_converged(&handle, &mut alice).await?;
    ensure_converged(&handle, &mut bob).await?;

    if persist {
        let saved = handle.save().await?;
        info!(stores = saved, "stores saved");
    }

    let rolled_back = alice.shutdown() + bob.shutdown();
    if rolled_back > 0 {
        warn!(rolled_back, "commands still in flight at shutdown");
    }

    Ok(drain(&mut command_events))
}

fn drain(events: &mut broadcast::Receiver<Event>) -> usize {
    let mut count = 0;
    loop {
        match events.try_recv() {
            Ok(Event::Command(CommandEvent::Rejected { client, id, error, .. })) => {
                info!(%client, %id, %error, "authority rejected a command");
                count += 1;
            }
            Ok(_) => count += 1,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => count += skipped as usize,
            Err(_) => break,
        }
    }
    count
}
