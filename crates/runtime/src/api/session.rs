//! Client side of the replicated-command protocol.
//!
//! A [`ClientSession`] owns replica stores, predicts commands against them,
//! submits them to the authority and keeps each one in an in-flight table
//! until its confirmation arrives, it times out, or the session shuts down.
//! Every exit path calls `command_confirmed` exactly once, so prediction
//! locks never outlive their command.
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use items_core::{
    CommandOutcome, ItemsDelta, ItemsStore, ItemsStores, ReplicatedCommand, StoreId,
};

use super::errors::{Result, RuntimeError};
use super::wire::{ClientId, ClientMessage, CommandEnvelope, CommandId, ServerMessage};
use crate::events::{CommandEvent, Event, EventBus, Origin, ReplicationEvent, StoreChange};

/// The authority's verdict on one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub id: CommandId,
    pub success: bool,
    pub outcome: CommandOutcome,
    pub error: Option<String>,
}

struct InFlight {
    command: Box<dyn ReplicatedCommand>,
    tag: &'static str,
    sent_at: Instant,
}

pub struct ClientSession {
    id: ClientId,
    stores: ItemsStores,
    outbound: mpsc::Sender<(ClientId, ClientMessage)>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    in_flight: BTreeMap<CommandId, InFlight>,
    confirmations: HashMap<CommandId, Confirmation>,
    next_command: u64,
    command_timeout: Duration,
    event_bus: EventBus,
}

impl ClientSession {
    pub(crate) fn new(
        id: ClientId,
        stores: ItemsStores,
        outbound: mpsc::Sender<(ClientId, ClientMessage)>,
        inbound: mpsc::UnboundedReceiver<ServerMessage>,
        command_timeout: Duration,
        event_bus: EventBus,
    ) -> Self {
        Self {
            id,
            stores,
            outbound,
            inbound,
            in_flight: BTreeMap::new(),
            confirmations: HashMap::new(),
            next_command: 1,
            command_timeout,
            event_bus,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Replica stores, including any prediction locks currently held.
    pub fn stores(&self) -> &ItemsStores {
        &self.stores
    }

    pub fn store(&self, store: StoreId) -> Option<&ItemsStore> {
        self.stores.get(store)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, id: CommandId) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Check, predict and submit `command`.
    ///
    /// Nothing is locked when the pre-check fails. Once locks are taken,
    /// any later failure releases them before returning.
    pub async fn send<C>(&mut self, mut command: C) -> Result<CommandId>
    where
        C: ReplicatedCommand + Serialize + 'static,
    {
        command.can_send_command(&self.stores)?;

        let id = CommandId(self.next_command);
        self.next_command += 1;
        let tag = command.type_tag();

        command.pre_send_command(&mut self.stores);
        self.publish_store_events();

        let envelope = match CommandEnvelope::encode(id, &command) {
            Ok(envelope) => envelope,
            Err(e) => {
                command.command_confirmed(&mut self.stores, false);
                self.publish_store_events();
                return Err(e);
            }
        };

        if self
            .outbound
            .send((self.id, ClientMessage::Submit(envelope)))
            .await
            .is_err()
        {
            command.command_confirmed(&mut self.stores, false);
            self.publish_store_events();
            return Err(RuntimeError::LinkClosed);
        }

        debug!(client = %self.id, %id, tag, "command sent");
        self.in_flight.insert(
            id,
            InFlight {
                command: Box::new(command),
                tag,
                sent_at: Instant::now(),
            },
        );
        self.event_bus.publish(Event::Command(CommandEvent::Sent {
            client: self.id,
            id,
            tag: tag.to_string(),
        }));

        Ok(id)
    }

    /// Handle every message already received, without waiting.
    ///
    /// Returns the number of messages handled.
    pub fn poll(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            match self.inbound.try_recv() {
                Ok(message) => {
                    self.handle_message(message)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) if handled > 0 => return Ok(handled),
                Err(TryRecvError::Disconnected) => return Err(RuntimeError::LinkClosed),
            }
        }
    }

    /// Wait for the next message from the authority and handle it.
    pub async fn recv(&mut self) -> Result<()> {
        let message = self.inbound.recv().await.ok_or(RuntimeError::LinkClosed)?;
        self.handle_message(message)
    }

    /// Drive the session until `id` is confirmed or times out.
    ///
    /// Only commands whose `needs_confirmation` is true leave a
    /// [`Confirmation`] behind; waiting on any other id returns
    /// [`RuntimeError::UnknownCommand`] once it settles.
    pub async fn wait_for(&mut self, id: CommandId) -> Result<Confirmation> {
        loop {
            if let Some(confirmation) = self.confirmations.remove(&id) {
                return Ok(confirmation);
            }

            let deadline = match self.in_flight.get(&id) {
                Some(flight) => flight.sent_at + self.command_timeout,
                None => return Err(RuntimeError::UnknownCommand { id }),
            };

            match tokio::time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(message)) => self.handle_message(message)?,
                Ok(None) => return Err(RuntimeError::LinkClosed),
                Err(_) => {
                    self.expire_timed_out();
                }
            }
        }
    }

    /// Take a confirmation that arrived while driving other commands.
    pub fn take_confirmation(&mut self, id: CommandId) -> Option<Confirmation> {
        self.confirmations.remove(&id)
    }

    /// Roll back every in-flight command older than the command timeout.
    ///
    /// Returns the number of commands rolled back.
    pub fn expire_timed_out(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<CommandId> = self
            .in_flight
            .iter()
            .filter(|(_, flight)| now.duration_since(flight.sent_at) >= self.command_timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(mut flight) = self.in_flight.remove(id) {
                warn!(client = %self.id, %id, tag = flight.tag, "command timed out");
                flight.command.command_confirmed(&mut self.stores, false);
                if flight.command.needs_confirmation() {
                    self.confirmations.insert(
                        *id,
                        Confirmation {
                            id: *id,
                            success: false,
                            outcome: CommandOutcome::Done,
                            error: Some("timed out waiting for the authority".into()),
                        },
                    );
                }
                self.event_bus.publish(Event::Command(CommandEvent::TimedOut {
                    client: self.id,
                    id: *id,
                    tag: flight.tag.to_string(),
                }));
            }
        }

        self.publish_store_events();
        expired.len()
    }

    /// Roll back everything still in flight and close the link.
    ///
    /// Returns the number of commands rolled back.
    pub fn shutdown(mut self) -> usize {
        let in_flight = std::mem::take(&mut self.in_flight);
        let count = in_flight.len();

        for (id, mut flight) in in_flight {
            debug!(client = %self.id, %id, tag = flight.tag, "rolling back on shutdown");
            flight.command.command_confirmed(&mut self.stores, false);
        }
        self.publish_store_events();

        info!(client = %self.id, rolled_back = count, "client session closed");
        count
    }

    fn handle_message(&mut self, message: ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Replicate { store, delta } => self.apply_delta(store, &delta),
            ServerMessage::Confirm {
                id,
                success,
                outcome,
                error,
            } => {
                self.confirm(Confirmation {
                    id,
                    success,
                    outcome,
                    error,
                });
                Ok(())
            }
        }
    }

    fn apply_delta(&mut self, store_id: StoreId, delta: &ItemsDelta) -> Result<()> {
        let store = self
            .stores
            .get_mut(store_id)
            .ok_or(RuntimeError::UnknownStore { store: store_id })?;
        let changes = store.apply_replication(delta)?;

        self.publish_store_events();
        self.event_bus
            .publish(Event::Replication(ReplicationEvent::DeltaApplied {
                client: self.id,
                store: store_id,
                changes,
            }));
        Ok(())
    }

    fn confirm(&mut self, confirmation: Confirmation) {
        let Some(mut flight) = self.in_flight.remove(&confirmation.id) else {
            debug!(
                client = %self.id,
                id = %confirmation.id,
                "confirmation for a command no longer in flight"
            );
            return;
        };

        flight
            .command
            .command_confirmed(&mut self.stores, confirmation.success);
        self.publish_store_events();

        if confirmation.success {
            debug!(client = %self.id, id = %confirmation.id, tag = flight.tag, "command confirmed");
        } else {
            info!(
                client = %self.id,
                id = %confirmation.id,
                tag = flight.tag,
                error = confirmation.error.as_deref().unwrap_or("unknown"),
                "command refused by authority"
            );
        }

        self.event_bus.publish(Event::Command(CommandEvent::Confirmed {
            client: self.id,
            id: confirmation.id,
            success: confirmation.success,
        }));

        if flight.command.needs_confirmation() {
            self.confirmations.insert(confirmation.id, confirmation);
        }
    }

    fn publish_store_events(&mut self) {
        for (store, event) in self.stores.drain_events() {
            self.event_bus.publish(Event::Store(StoreChange {
                origin: Origin::Client(self.id),
                store,
                event,
            }));
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("stores", &self.stores.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
