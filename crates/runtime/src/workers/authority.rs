//! Authority worker that owns the authoritative [`ItemsStores`].
//!
//! Receives submissions from client sessions and administrative commands from
//! [`crate::RuntimeHandle`], executes commands through the
//! [`CommandRegistry`], replicates per-store deltas to every connected client
//! and publishes events to the EventBus.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use items_core::{
    CommandError, ItemId, ItemSpec, ItemsError, ItemsStores, ReplicatedCommand, StoreConfig,
    StoreId,
};

use crate::api::wire::{ClientId, ClientMessage, CommandEnvelope, ServerMessage};
use crate::api::{CommandRegistry, Result, RuntimeError};
use crate::events::{CommandEvent, Event, EventBus, Origin, ReplicationEvent, StoreChange};
use crate::repository::{StoreRepository, StoreSnapshot};

/// Reply to [`Command::Connect`].
#[derive(Debug, Clone)]
pub struct Connected {
    pub client: ClientId,
    pub stores: Vec<StoreId>,
}

/// Commands that can be sent to the authority worker
pub enum Command {
    /// Register a client link. Full replicas of every store are queued on
    /// `outbound` before the reply is sent.
    Connect {
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Connected>,
    },
    /// Create an item on the authority (loot, rewards) and replicate it.
    GrantItem {
        store: StoreId,
        spec: ItemSpec,
        reply: oneshot::Sender<Result<ItemId>>,
    },
    /// Capture a store's contents.
    Snapshot {
        store: StoreId,
        reply: oneshot::Sender<Result<StoreSnapshot>>,
    },
    /// Content digest of a store, for comparing replicas.
    Digest {
        store: StoreId,
        reply: oneshot::Sender<Result<[u8; 32]>>,
    },
    /// Persist every store through the configured repository.
    Save { reply: oneshot::Sender<Result<usize>> },
}

struct ClientLink {
    outbound: mpsc::UnboundedSender<ServerMessage>,
    /// Replication key of the last delta sent, per store.
    sent: HashMap<StoreId, u64>,
}

/// Background task that executes replicated commands.
pub struct AuthorityWorker {
    stores: ItemsStores,
    registry: CommandRegistry,
    command_rx: mpsc::Receiver<Command>,
    inbound_rx: mpsc::Receiver<(ClientId, ClientMessage)>,
    clients: BTreeMap<ClientId, ClientLink>,
    next_client: u32,
    event_bus: EventBus,
    store_config: StoreConfig,
    repository: Option<Arc<dyn StoreRepository>>,
}

impl AuthorityWorker {
    pub fn new(
        stores: ItemsStores,
        registry: CommandRegistry,
        command_rx: mpsc::Receiver<Command>,
        inbound_rx: mpsc::Receiver<(ClientId, ClientMessage)>,
        event_bus: EventBus,
        store_config: StoreConfig,
        repository: Option<Arc<dyn StoreRepository>>,
    ) -> Self {
        info!(
            stores = stores.len(),
            commands = ?registry.tags(),
            "AuthorityWorker initialized"
        );

        Self {
            stores,
            registry,
            command_rx,
            inbound_rx,
            clients: BTreeMap::new(),
            next_client: 1,
            event_bus,
            store_config,
            repository,
        }
    }

    /// Main worker loop. Ends once every [`crate::RuntimeHandle`] is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some((client, message)) = self.inbound_rx.recv() => {
                    self.handle_message(client, message);
                }
            }
        }

        debug!(clients = self.clients.len(), "AuthorityWorker stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { outbound, reply } => {
                let connected = self.connect(outbound);
                if reply.send(connected).is_err() {
                    debug!("Connect reply channel closed (caller dropped)");
                }
            }
            Command::GrantItem { store, spec, reply } => {
                let result = self.grant_item(store, &spec);
                if reply.send(result).is_err() {
                    debug!("GrantItem reply channel closed (caller dropped)");
                }
            }
            Command::Snapshot { store, reply } => {
                let result = self
                    .stores
                    .get(store)
                    .map(StoreSnapshot::capture)
                    .ok_or(RuntimeError::UnknownStore { store });
                if reply.send(result).is_err() {
                    debug!("Snapshot reply channel closed (caller dropped)");
                }
            }
            Command::Digest { store, reply } => {
                let result = self
                    .stores
                    .get(store)
                    .map(|s| s.items_array().digest())
                    .ok_or(RuntimeError::UnknownStore { store });
                if reply.send(result).is_err() {
                    debug!("Digest reply channel closed (caller dropped)");
                }
            }
            Command::Save { reply } => {
                let result = self.save();
                if reply.send(result).is_err() {
                    debug!("Save reply channel closed (caller dropped)");
                }
            }
        }
    }

    fn connect(&mut self, outbound: mpsc::UnboundedSender<ServerMessage>) -> Connected {
        let client = ClientId(self.next_client);
        self.next_client += 1;

        let mut link = ClientLink {
            outbound,
            sent: HashMap::new(),
        };

        for store in self.stores.iter() {
            let delta = store.items_array().full_delta(0);
            self.event_bus
                .publish(Event::Replication(ReplicationEvent::DeltaSent {
                    client,
                    store: store.id(),
                    from_key: delta.from_key,
                    to_key: delta.to_key,
                    full: true,
                }));
            link.sent.insert(store.id(), delta.to_key);
            // A closed link is pruned on the next replication pass.
            let _ = link.outbound.send(ServerMessage::Replicate {
                store: store.id(),
                delta,
            });
        }

        self.clients.insert(client, link);
        info!(%client, "client connected");

        Connected {
            client,
            stores: self.stores.ids().collect(),
        }
    }

    fn grant_item(&mut self, store_id: StoreId, spec: &ItemSpec) -> Result<ItemId> {
        let store = self
            .stores
            .get_mut(store_id)
            .ok_or(RuntimeError::UnknownStore { store: store_id })?;
        let id = store.add_item(spec)?;

        self.publish_store_events();
        self.replicate();
        Ok(id)
    }

    fn save(&mut self) -> Result<usize> {
        let repository = self
            .repository
            .as_ref()
            .ok_or(RuntimeError::MissingRepository)?;

        for store in self.stores.iter() {
            repository.save(&StoreSnapshot::capture(store))?;
        }

        info!(stores = self.stores.len(), "stores saved");
        Ok(self.stores.len())
    }

    fn handle_message(&mut self, client: ClientId, message: ClientMessage) {
        match message {
            ClientMessage::Submit(envelope) => {
                let reply = self.handle_submission(client, envelope);
                self.send_to(client, reply);
            }
        }
    }

    /// Decodes and executes one submission. Replication of its effects is
    /// queued before the returned confirmation.
    fn handle_submission(&mut self, client: ClientId, envelope: CommandEnvelope) -> ServerMessage {
        let id = envelope.id;

        let command = match self.registry.decode(&envelope) {
            Ok(command) => command,
            Err(e) => {
                warn!(%client, %id, tag = %envelope.tag, error = %e, "submission rejected");
                self.event_bus.publish(Event::Command(CommandEvent::Rejected {
                    client,
                    id,
                    tag: envelope.tag,
                    error: e.to_string(),
                }));
                return ServerMessage::rejected(id, e);
            }
        };

        match self.execute(command.as_ref()) {
            Ok(outcome) => {
                debug!(%client, %id, tag = command.type_tag(), ?outcome, "command executed");
                self.publish_store_events();
                self.replicate();
                self.event_bus.publish(Event::Command(CommandEvent::Executed {
                    client,
                    id,
                    tag: envelope.tag,
                    outcome: outcome.clone(),
                }));
                ServerMessage::Confirm {
                    id,
                    success: true,
                    outcome,
                    error: None,
                }
            }
            Err(e) => {
                log_rejection(client, &envelope.tag, &e);
                self.event_bus.publish(Event::Command(CommandEvent::Rejected {
                    client,
                    id,
                    tag: envelope.tag,
                    error: e.to_string(),
                }));
                ServerMessage::rejected(id, e)
            }
        }
    }

    fn execute(
        &mut self,
        command: &dyn ReplicatedCommand,
    ) -> std::result::Result<items_core::CommandOutcome, CommandError> {
        // Nothing has been replicated since the last command, so restoring
        // the backup rolls keys and versions back as well.
        let backup = self.stores.clone();
        let result = command.execute(&mut self.stores);
        if result.is_err() {
            let stray = self.stores.drain_events();
            if !stray.is_empty() {
                error!(
                    tag = command.type_tag(),
                    events = stray.len(),
                    "refused command left partial effects"
                );
            }
            self.stores = backup;
        }
        result
    }

    fn publish_store_events(&mut self) {
        for (store, event) in self.stores.drain_events() {
            self.event_bus.publish(Event::Store(StoreChange {
                origin: Origin::Authority,
                store,
                event,
            }));
        }
    }

    /// Sends every connected client the changes it has not seen yet, then
    /// compacts tombstones older than the retention window that every client
    /// has already received.
    fn replicate(&mut self) {
        let mut closed = Vec::new();

        for store in self.stores.iter() {
            let store_id = store.id();
            for (client, link) in &mut self.clients {
                let from_key = link.sent.get(&store_id).copied().unwrap_or(0);
                let delta = store.delta_since(from_key);
                if delta.is_empty() {
                    continue;
                }

                let event = ReplicationEvent::DeltaSent {
                    client: *client,
                    store: store_id,
                    from_key: delta.from_key,
                    to_key: delta.to_key,
                    full: delta.full,
                };
                link.sent.insert(store_id, delta.to_key);
                if link
                    .outbound
                    .send(ServerMessage::Replicate {
                        store: store_id,
                        delta,
                    })
                    .is_err()
                {
                    closed.push(*client);
                    continue;
                }
                self.event_bus.publish(Event::Replication(event));
            }
        }

        for client in closed {
            if self.clients.remove(&client).is_some() {
                info!(%client, "client disconnected");
            }
        }

        self.compact();
    }

    fn compact(&mut self) {
        let retention = self.store_config.tombstone_retention;
        for store in self.stores.iter_mut() {
            let key = store.items_array().replication_key();
            let cursor = self
                .clients
                .values()
                .filter_map(|link| link.sent.get(&store.id()).copied())
                .min()
                .unwrap_or(key);
            store.compact_tombstones(cursor.min(key.saturating_sub(retention)));
        }
    }

    fn send_to(&mut self, client: ClientId, message: ServerMessage) {
        let Some(link) = self.clients.get(&client) else {
            debug!(%client, "reply for unknown client dropped");
            return;
        };
        if link.outbound.send(message).is_err() {
            self.clients.remove(&client);
            info!(%client, "client disconnected");
        }
    }
}

fn log_rejection(client: ClientId, tag: &str, error: &CommandError) {
    let severity = error.severity();
    if severity.is_internal() {
        error!(%client, tag, code = error.error_code(), %severity, "command failed: {error}");
    } else if severity.is_recoverable() {
        info!(%client, tag, code = error.error_code(), %severity, "command refused: {error}");
    } else {
        warn!(%client, tag, code = error.error_code(), %severity, "command rejected: {error}");
    }
}
